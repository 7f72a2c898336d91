//! Reader for uncompressed, strip-organised sensor payloads.
//!
//! Handles 16-bit samples in the file's byte order and 12-bit samples packed
//! two to three bytes, most significant bits first. Geometry, levels and the
//! colour matrix come from the camera table; white balance and orientation
//! from the file's own tags.

use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::raw::cameras::{self, CameraEntry};
use crate::image_pipeline::raw::container::{
    tags, Ifd, TiffContainer, COMPRESSION_NONE, PHOTOMETRIC_CFA,
};
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::source::RawSource;
use crate::image_pipeline::raw::types::{
    bits_for_white_level, CameraId, DecodeLimits, SensorMetadata, UnpackedImage,
};

/// The directory holding the sensor mosaic and its declared format.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawIfd<'c> {
    pub ifd: &'c Ifd,
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u32,
    pub compression: u32,
}

/// Largest full-resolution single-sample directory in the container.
pub(crate) fn locate_raw_ifd<'c>(container: &'c TiffContainer<'_>) -> Result<Option<RawIfd<'c>>> {
    let mut best: Option<RawIfd<'c>> = None;

    for ifd in container.ifds() {
        let samples = container.u32_value(ifd, tags::SAMPLES_PER_PIXEL)?.unwrap_or(1);
        let subfile = container.u32_value(ifd, tags::NEW_SUBFILE_TYPE)?.unwrap_or(0);
        if samples != 1 || subfile & 1 != 0 {
            continue;
        }
        let bits = container.u32_value(ifd, tags::BITS_PER_SAMPLE)?.unwrap_or(0);
        let photometric = container.u32_value(ifd, tags::PHOTOMETRIC)?.unwrap_or(0);
        if photometric != PHOTOMETRIC_CFA && bits < 10 {
            continue;
        }
        let (Some(width), Some(height)) = (
            container.u32_value(ifd, tags::IMAGE_WIDTH)?,
            container.u32_value(ifd, tags::IMAGE_LENGTH)?,
        ) else {
            continue;
        };
        let compression = container
            .u32_value(ifd, tags::COMPRESSION)?
            .unwrap_or(COMPRESSION_NONE);

        let candidate = RawIfd {
            ifd,
            width,
            height,
            bits_per_sample: bits,
            compression,
        };
        let area = |r: &RawIfd<'_>| r.width as u64 * r.height as u64;
        if best.as_ref().is_none_or(|b| area(&candidate) > area(b)) {
            best = Some(candidate);
        }
    }

    Ok(best)
}

/// AsShotNeutral holds the neutral colour in camera space; multipliers are
/// its reciprocal, normalised to green.
fn neutral_to_multipliers(neutral: &[f64]) -> Option<[f32; 3]> {
    if neutral.len() < 3 || neutral[..3].iter().any(|&n| !n.is_finite() || n <= 0.0) {
        return None;
    }
    let green = 1.0 / neutral[1];
    Some([
        ((1.0 / neutral[0]) / green) as f32,
        1.0,
        ((1.0 / neutral[2]) / green) as f32,
    ])
}

pub struct StripReader {
    limits: DecodeLimits,
}

impl StripReader {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub(crate) fn unpack(
        &self,
        container: &TiffContainer<'_>,
        raw: &RawIfd<'_>,
        entry: &CameraEntry,
        camera: &CameraId,
    ) -> Result<UnpackedImage> {
        if raw.compression != COMPRESSION_NONE {
            return Err(ConversionError::UnsupportedFormat(format!(
                "compression {} is not an uncompressed strip payload",
                raw.compression
            )));
        }

        let width = raw.width as usize;
        let height = raw.height as usize;
        self.limits.check(width, height)?;

        let layout = &entry.layout;
        let top = layout.border.top as usize;
        let left = layout.border.left as usize;
        let active_width = width
            .checked_sub(left + layout.border.right as usize)
            .filter(|&w| w >= 2)
            .ok_or_else(|| {
                ConversionError::CorruptFile(format!(
                    "sensor width {} leaves no active area for {}",
                    width, camera
                ))
            })?;
        let active_height = height
            .checked_sub(top + layout.border.bottom as usize)
            .filter(|&h| h >= 2)
            .ok_or_else(|| {
                ConversionError::CorruptFile(format!(
                    "sensor height {} leaves no active area for {}",
                    height, camera
                ))
            })?;

        let row_bytes = match raw.bits_per_sample {
            16 => width * 2,
            12 if width % 2 == 0 => width / 2 * 3,
            12 => {
                return Err(ConversionError::CorruptFile(
                    "12-bit packed rows need an even width".to_string(),
                ));
            }
            other => {
                return Err(ConversionError::UnsupportedFormat(format!(
                    "{}-bit uncompressed samples",
                    other
                )));
            }
        };

        let ifd = raw.ifd;
        let offsets = container
            .u32s(ifd, tags::STRIP_OFFSETS)?
            .ok_or_else(|| ConversionError::CorruptFile("missing StripOffsets".to_string()))?;
        let counts = container
            .u32s(ifd, tags::STRIP_BYTE_COUNTS)?
            .ok_or_else(|| ConversionError::CorruptFile("missing StripByteCounts".to_string()))?;
        let rows_per_strip = container
            .u32_value(ifd, tags::ROWS_PER_STRIP)?
            .map(|r| r as usize)
            .filter(|&r| r > 0)
            .unwrap_or(height)
            .min(height);
        let strip_count = height.div_ceil(rows_per_strip);
        if offsets.len() < strip_count || counts.len() < strip_count {
            return Err(ConversionError::CorruptFile(format!(
                "{} strips declared, {} needed",
                offsets.len().min(counts.len()),
                strip_count
            )));
        }

        let data = container.data();
        let mut strips = Vec::with_capacity(strip_count);
        for (index, (&offset, &count)) in offsets.iter().zip(&counts).take(strip_count).enumerate() {
            let rows = rows_per_strip.min(height - index * rows_per_strip);
            let needed = rows * row_bytes;
            if (count as usize) < needed {
                return Err(ConversionError::CorruptFile(format!(
                    "strip {} holds {} bytes, {} expected",
                    index, count, needed
                )));
            }
            let start = offset as usize;
            let end = start
                .checked_add(needed)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| {
                    ConversionError::CorruptFile(format!(
                        "strip {} runs past the end of the file (truncated?)",
                        index
                    ))
                })?;
            strips.push(&data[start..end]);
        }

        let order = container.byte_order();
        let mut samples = Vec::with_capacity(active_width * active_height);
        for row in top..top + active_height {
            let strip = strips[row / rows_per_strip];
            let start = (row % rows_per_strip) * row_bytes;
            let line = &strip[start..start + row_bytes];
            match raw.bits_per_sample {
                16 => samples.extend(
                    line[left * 2..(left + active_width) * 2]
                        .chunks_exact(2)
                        .map(|b| order.u16([b[0], b[1]])),
                ),
                _ => samples.extend((left..left + active_width).map(|col| {
                    let at = col / 2 * 3;
                    if col % 2 == 0 {
                        (line[at] as u16) << 4 | (line[at + 1] >> 4) as u16
                    } else {
                        ((line[at + 1] & 0x0F) as u16) << 8 | line[at + 2] as u16
                    }
                })),
            }
        }

        let ifd0 = container.ifd0();
        let orientation = ifd0
            .and_then(|ifd| container.u32_value(ifd, tags::ORIENTATION).ok().flatten())
            .and_then(Orientation::from_exif)
            .unwrap_or_default();
        let as_shot_wb = [Some(ifd), ifd0]
            .into_iter()
            .flatten()
            .find_map(|ifd| container.rationals(ifd, tags::AS_SHOT_NEUTRAL).ok().flatten())
            .and_then(|neutral| neutral_to_multipliers(&neutral));

        debug!(
            "Unpacked {}x{} active area ({}-bit strips, border {}+{})",
            active_width, active_height, raw.bits_per_sample, left, top
        );

        Ok(UnpackedImage {
            width: active_width,
            height: active_height,
            samples,
            metadata: SensorMetadata {
                camera: camera.clone(),
                cfa: layout.cfa_pattern().shifted(left, top),
                black_levels: [layout.black_level; 3],
                white_level: layout.white_level,
                bits_per_sample: bits_for_white_level(layout.white_level),
                as_shot_wb,
                xyz_to_cam: Some(layout.xyz_to_cam_matrix()),
                orientation,
            },
        })
    }
}

impl RawImageReader for StripReader {
    fn read_raw(&self, source: &RawSource) -> Result<UnpackedImage> {
        let camera = source.camera()?;
        let entry = cameras::require(camera)?;
        let container = TiffContainer::parse(source.bytes())?;
        let raw = locate_raw_ifd(&container)?
            .ok_or_else(|| ConversionError::CorruptFile("no raw image directory".to_string()))?;
        self.unpack(&container, &raw, entry, camera)
    }

    fn set_limits(&mut self, limits: DecodeLimits) {
        self.limits = limits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::raw::types::{BayerPattern, CfaPattern};
    use crate::image_pipeline::testing::RawFixture;

    fn read(bytes: Vec<u8>) -> Result<UnpackedImage> {
        StripReader::new(DecodeLimits::default()).read_raw(&RawSource::from_bytes(bytes))
    }

    #[test]
    fn test_reads_16_bit_samples_in_order() {
        let samples: Vec<u16> = (0..48).map(|i| 1000 + i).collect();
        let image = read(RawFixture::sony(8, 6).with_samples(samples.clone()).build()).unwrap();
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(image.samples, samples);
        assert_eq!(image.metadata.black_levels, [512; 3]);
        assert_eq!(image.metadata.white_level, 16383);
        assert_eq!(image.metadata.bits_per_sample, 14);
        assert_eq!(image.metadata.cfa, CfaPattern::Bayer(BayerPattern::Rggb));
    }

    #[test]
    fn test_multiple_strips() {
        let samples: Vec<u16> = (0..80).map(|i| i * 7).collect();
        let image = read(
            RawFixture::sony(8, 10)
                .with_samples(samples.clone())
                .with_rows_per_strip(3)
                .build(),
        )
        .unwrap();
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn test_reads_12_bit_packed_samples() {
        let samples: Vec<u16> = (0..24).map(|i| (i * 170) % 4096).collect();
        let image = read(
            RawFixture::new("OLYMPUS CORPORATION", "E-M1MarkII", 6, 4)
                .with_samples(samples.clone())
                .with_bits(12)
                .build(),
        )
        .unwrap();
        assert_eq!(image.samples, samples);
        assert_eq!(image.metadata.bits_per_sample, 12);
    }

    #[test]
    fn test_masked_border_is_dropped() {
        let width = 140;
        let height = 46;
        let samples: Vec<u16> = (0..width * height)
            .map(|i| if i % width >= 136 && i / width >= 42 { 9000 } else { 600 })
            .map(|v| v as u16)
            .collect();
        let image = read(
            RawFixture::canon(width as u32, height as u32)
                .with_samples(samples)
                .build(),
        )
        .unwrap();
        assert_eq!((image.width, image.height), (4, 4));
        assert!(image.samples.iter().all(|&s| s == 9000));
        assert_eq!(image.metadata.cfa, CfaPattern::Bayer(BayerPattern::Rggb));
    }

    #[test]
    fn test_as_shot_neutral_becomes_multipliers() {
        let image = read(
            RawFixture::sony(4, 4)
                .with_as_shot_neutral([0.5, 1.0, 0.8])
                .build(),
        )
        .unwrap();
        let wb = image.metadata.as_shot_wb.unwrap();
        assert!((wb[0] - 2.0).abs() < 1e-4);
        assert_eq!(wb[1], 1.0);
        assert!((wb[2] - 1.25).abs() < 1e-4);
    }

    #[test]
    fn test_orientation_tag() {
        let image = read(RawFixture::sony(4, 4).with_orientation(6).build()).unwrap();
        assert_eq!(image.metadata.orientation, Orientation::Rotate90CW);

        let image = read(RawFixture::sony(4, 4).with_orientation(42).build()).unwrap();
        assert_eq!(image.metadata.orientation, Orientation::Normal);
    }

    #[test]
    fn test_truncated_strip_is_corrupt() {
        let mut bytes = RawFixture::sony(16, 16).build();
        bytes.truncate(bytes.len() - 100);
        let err = read(bytes).unwrap_err();
        assert!(matches!(err, ConversionError::CorruptFile(ref m) if m.contains("truncated")));
    }

    #[test]
    fn test_oversized_dimensions_rejected_before_allocation() {
        let bytes = RawFixture::sony(4, 4).with_declared_size(60_000, 4).build();
        let err = read(bytes).unwrap_err();
        assert!(matches!(err, ConversionError::CorruptFile(_)));
    }

    #[test]
    fn test_compressed_payload_is_not_handled() {
        let bytes = RawFixture::sony(4, 4).with_compression(7).build();
        let err = read(bytes).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_unknown_camera_is_unsupported() {
        let err = read(RawFixture::new("SONY", "ILCE-1", 4, 4).build()).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_neutral_rejects_non_positive() {
        assert!(neutral_to_multipliers(&[0.0, 1.0, 1.0]).is_none());
        assert!(neutral_to_multipliers(&[0.5, 1.0]).is_none());
    }
}
