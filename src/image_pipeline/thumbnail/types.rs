use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{ImageBuffer, ImageReader};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::processing::{apply_orientation, FinishedImage, PixelData, RgbImage};

/// Preview payload as stored in the RAW file.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailKind {
    /// Complete JPEG stream, SOI marker first
    Jpeg(Vec<u8>),
    /// Uncompressed interleaved 8-bit RGB
    Bitmap(Vec<u8>),
}

/// An embedded preview image.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub kind: ThumbnailKind,
    pub width: u32,
    pub height: u32,
    /// Orientation recorded for the RAW image itself
    pub orientation: Orientation,
}

impl Thumbnail {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn byte_len(&self) -> usize {
        match &self.kind {
            ThumbnailKind::Jpeg(bytes) | ThumbnailKind::Bitmap(bytes) => bytes.len(),
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.kind, ThumbnailKind::Jpeg(_))
    }

    /// Decode into an upright 8-bit RGB image.
    ///
    /// A JPEG's own EXIF orientation takes precedence over the RAW's.
    pub fn decode(&self) -> Result<FinishedImage> {
        let (image, orientation) = match &self.kind {
            ThumbnailKind::Jpeg(bytes) => {
                let orientation = jpeg_orientation(bytes).unwrap_or(self.orientation);
                (decode_jpeg(bytes)?, orientation)
            }
            ThumbnailKind::Bitmap(rgb) => {
                let image: RgbImage<u8> =
                    ImageBuffer::from_raw(self.width, self.height, rgb.clone()).ok_or_else(|| {
                        ConversionError::CorruptFile(format!(
                            "{} preview bytes do not fill {}x{} RGB",
                            rgb.len(),
                            self.width,
                            self.height
                        ))
                    })?;
                (image, self.orientation)
            }
        };
        debug!(
            "Decoded {}x{} preview, orientation {:?}",
            image.width(),
            image.height(),
            orientation
        );

        let image = apply_orientation(image, orientation);
        Ok(FinishedImage {
            width: image.width(),
            height: image.height(),
            pixels: PixelData::Eight(image.into_raw()),
        })
    }
}

fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage<u8>> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ConversionError::CorruptFile(format!("embedded preview: {}", e)))?;
    let image = reader
        .decode()
        .map_err(|e| ConversionError::CorruptFile(format!("embedded preview: {}", e)))?;
    Ok(image.into_rgb8())
}

/// EXIF orientation of a JPEG stream, if it carries one.
pub(crate) fn jpeg_orientation(bytes: &[u8]) -> Option<Orientation> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    Orientation::from_exif(field.value.get_uint(0)?)
}

/// Pixel dimensions from the JPEG header, without decoding.
pub(crate) fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
