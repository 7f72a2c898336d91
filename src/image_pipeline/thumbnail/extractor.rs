//! Locating embedded previews.
//!
//! Every directory of a TIFF-based file is inspected for a JPEG pointer pair,
//! a single JPEG-compressed strip or an uncompressed 8-bit RGB image. Fujifilm
//! RAF files carry their JPEG pointer in the fixed header. The candidate with
//! the most pixels wins; equal areas go to the larger payload.

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::raw::container::{
    tags, Ifd, TiffContainer, COMPRESSION_JPEG, COMPRESSION_JPEG_OLD, COMPRESSION_NONE,
    PHOTOMETRIC_RGB,
};
use crate::image_pipeline::raw::{raf_jpeg_location, ContainerKind, RawSource};
use crate::image_pipeline::thumbnail::types::{jpeg_dimensions, Thumbnail, ThumbnailKind};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

fn slice(bytes: &[u8], offset: usize, length: usize) -> Option<&[u8]> {
    if length == 0 {
        return None;
    }
    bytes.get(offset..offset.checked_add(length)?)
}

/// A JPEG candidate survives only if it starts with SOI and its header parses.
fn jpeg_candidate(bytes: &[u8], orientation: Orientation) -> Option<Thumbnail> {
    if !bytes.starts_with(&JPEG_SOI) {
        return None;
    }
    let Some((width, height)) = jpeg_dimensions(bytes) else {
        debug!("Skipping {}-byte JPEG preview with unreadable header", bytes.len());
        return None;
    };
    Some(Thumbnail {
        kind: ThumbnailKind::Jpeg(bytes.to_vec()),
        width,
        height,
        orientation,
    })
}

fn pointer_jpeg(
    container: &TiffContainer<'_>,
    ifd: &Ifd,
    orientation: Orientation,
) -> Result<Option<Thumbnail>> {
    let (Some(offset), Some(length)) = (
        container.u32_value(ifd, tags::JPEG_OFFSET)?,
        container.u32_value(ifd, tags::JPEG_LENGTH)?,
    ) else {
        return Ok(None);
    };
    Ok(slice(container.data(), offset as usize, length as usize)
        .and_then(|bytes| jpeg_candidate(bytes, orientation)))
}

fn strips(container: &TiffContainer<'_>, ifd: &Ifd) -> Result<Option<(Vec<u32>, Vec<u32>)>> {
    match (
        container.u32s(ifd, tags::STRIP_OFFSETS)?,
        container.u32s(ifd, tags::STRIP_BYTE_COUNTS)?,
    ) {
        (Some(offsets), Some(counts)) if !offsets.is_empty() && offsets.len() == counts.len() => {
            Ok(Some((offsets, counts)))
        }
        _ => Ok(None),
    }
}

fn strip_jpeg(
    container: &TiffContainer<'_>,
    ifd: &Ifd,
    orientation: Orientation,
) -> Result<Option<Thumbnail>> {
    let compression = container.u32_value(ifd, tags::COMPRESSION)?;
    if !matches!(compression, Some(COMPRESSION_JPEG_OLD | COMPRESSION_JPEG)) {
        return Ok(None);
    }
    let Some((offsets, counts)) = strips(container, ifd)? else {
        return Ok(None);
    };
    // Split JPEG streams cannot be stitched back into one file.
    if offsets.len() != 1 {
        return Ok(None);
    }
    Ok(slice(container.data(), offsets[0] as usize, counts[0] as usize)
        .and_then(|bytes| jpeg_candidate(bytes, orientation)))
}

fn strip_bitmap(
    container: &TiffContainer<'_>,
    ifd: &Ifd,
    orientation: Orientation,
) -> Result<Option<Thumbnail>> {
    let compression = container
        .u32_value(ifd, tags::COMPRESSION)?
        .unwrap_or(COMPRESSION_NONE);
    let photometric = container.u32_value(ifd, tags::PHOTOMETRIC)?;
    let samples = container.u32_value(ifd, tags::SAMPLES_PER_PIXEL)?;
    let bits = container.u32s(ifd, tags::BITS_PER_SAMPLE)?.unwrap_or_default();
    if compression != COMPRESSION_NONE
        || photometric != Some(PHOTOMETRIC_RGB)
        || samples != Some(3)
        || bits.is_empty()
        || bits.iter().any(|&b| b != 8)
    {
        return Ok(None);
    }
    let (Some(width), Some(height)) = (
        container.u32_value(ifd, tags::IMAGE_WIDTH)?,
        container.u32_value(ifd, tags::IMAGE_LENGTH)?,
    ) else {
        return Ok(None);
    };
    let Some((offsets, counts)) = strips(container, ifd)? else {
        return Ok(None);
    };
    let needed = (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(3))
        .unwrap_or(usize::MAX);
    if needed == 0 || needed > container.data().len() {
        return Ok(None);
    }

    let mut rgb = Vec::with_capacity(needed);
    for (&offset, &count) in offsets.iter().zip(&counts) {
        let Some(strip) = slice(container.data(), offset as usize, count as usize) else {
            debug!("RGB preview strip at {} runs past the end of the file", offset);
            return Ok(None);
        };
        let take = strip.len().min(needed - rgb.len());
        rgb.extend_from_slice(&strip[..take]);
        if rgb.len() == needed {
            break;
        }
    }
    if rgb.len() != needed {
        return Ok(None);
    }
    Ok(Some(Thumbnail {
        kind: ThumbnailKind::Bitmap(rgb),
        width,
        height,
        orientation,
    }))
}

fn tiff_candidates(bytes: &[u8]) -> Result<Vec<Thumbnail>> {
    let container = TiffContainer::parse(bytes)?;
    let orientation = match container.ifd0() {
        Some(ifd0) => container
            .u32_value(ifd0, tags::ORIENTATION)?
            .and_then(Orientation::from_exif)
            .unwrap_or_default(),
        None => Orientation::Normal,
    };

    let mut found = Vec::new();
    for ifd in container.ifds() {
        for candidate in [
            pointer_jpeg(&container, ifd, orientation)?,
            strip_jpeg(&container, ifd, orientation)?,
            strip_bitmap(&container, ifd, orientation)?,
        ]
        .into_iter()
        .flatten()
        {
            debug!(
                ifd = ifd.offset,
                "Preview candidate {}x{} ({} bytes, jpeg={})",
                candidate.width,
                candidate.height,
                candidate.byte_len(),
                candidate.is_jpeg()
            );
            found.push(candidate);
        }
    }
    Ok(found)
}

fn raf_candidates(bytes: &[u8]) -> Vec<Thumbnail> {
    raf_jpeg_location(bytes)
        .and_then(|(offset, length)| slice(bytes, offset, length))
        .and_then(|jpeg| jpeg_candidate(jpeg, Orientation::Normal))
        .into_iter()
        .collect()
}

/// Largest embedded preview of `source`.
#[instrument(skip_all, fields(size = source.len()))]
pub fn extract_thumbnail(source: &RawSource) -> Result<Thumbnail> {
    let candidates = match source.container()? {
        ContainerKind::Tiff(_) => tiff_candidates(source.bytes())?,
        ContainerKind::FujiRaf => raf_candidates(source.bytes()),
    };

    let best = candidates
        .into_iter()
        .max_by_key(|t| (t.area(), t.byte_len()))
        .ok_or(ConversionError::NoEmbeddedThumbnail)?;
    debug!("Selected {}x{} preview", best.width, best.height);
    Ok(best)
}
