//! RAW image reader implementation using the rawloader library.
//!
//! Compressed payloads (lossless JPEG, Nikon/Sony/Fuji vendor schemes) and
//! RAF containers are decoded here. The camera still has to be in the
//! supported table; rawloader only supplies the pixels and its own levels.

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use rawloader::RawImageData as RawloaderImageData;
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::raw::cameras;
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::source::RawSource;
use crate::image_pipeline::raw::types::{
    bits_for_white_level, CfaPattern, DecodeLimits, SensorMetadata, UnpackedImage,
};

/// RAW image reader that uses the rawloader library for decoding.
pub struct RawLoaderReader {
    limits: DecodeLimits,
}

/// Map a rawloader failure onto the error vocabulary.
///
/// rawloader reports everything as a message; the ones about unknown
/// cameras or formats are "unsupported", the rest mean the bytes are bad.
fn classify(err: rawloader::RawLoaderError) -> ConversionError {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("couldn't find camera")
        || lower.contains("couldn't find a decoder")
        || lower.contains("unsupported")
    {
        ConversionError::UnsupportedFormat(message)
    } else {
        ConversionError::CorruptFile(message)
    }
}

/// Run a rawloader entry point, turning its size-sanity panic into an error.
fn guarded<T>(
    call: impl FnOnce() -> std::result::Result<T, rawloader::RawLoaderError>,
) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(ConversionError::CorruptFile(
            "declared raw dimensions are implausibly large".to_string(),
        )),
    }
}

/// Check the header's dimensions against `limits`, then run the full decode.
/// `probe` must not allocate the pixel buffer.
fn decode_within_limits<T>(
    limits: &DecodeLimits,
    probe: impl FnOnce() -> Result<(usize, usize)>,
    decode: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let (width, height) = probe()?;
    limits.check(width, height)?;
    decode()
}

/// Normalise rawloader's as-shot coefficients to green = 1.
fn as_shot_multipliers(coeffs: [f32; 4]) -> Option<[f32; 3]> {
    let [r, g, b, _] = coeffs;
    if [r, g, b].iter().all(|c| c.is_finite() && *c > 0.0) {
        Some([r / g, 1.0, b / g])
    } else {
        None
    }
}

impl RawLoaderReader {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }
}

impl RawImageReader for RawLoaderReader {
    fn read_raw(&self, source: &RawSource) -> Result<UnpackedImage> {
        let camera = source.camera()?;
        let entry = cameras::require(camera)?;
        debug!("Decoding RAW image with rawloader, {} bytes", source.len());

        let bytes = source.bytes();
        let decoded = decode_within_limits(
            &self.limits,
            || {
                let header = guarded(|| rawloader::decode_dummy(&mut Cursor::new(bytes)))?;
                debug!("rawloader header: {}x{}", header.width, header.height);
                Ok((header.width, header.height))
            },
            || guarded(|| rawloader::decode(&mut Cursor::new(bytes))),
        )?;
        if decoded.cpp != 1 {
            return Err(ConversionError::UnsupportedFormat(format!(
                "{} samples per pixel (already demosaiced data)",
                decoded.cpp
            )));
        }

        let width = decoded.width;
        let height = decoded.height;

        // crops are top, right, bottom, left
        let [top, right, bottom, left] = decoded.crops;
        let active_width = width.saturating_sub(left + right);
        let active_height = height.saturating_sub(top + bottom);
        if active_width < 2 || active_height < 2 {
            return Err(ConversionError::CorruptFile(format!(
                "crop {:?} leaves no active area in {}x{}",
                decoded.crops, width, height
            )));
        }
        debug!("Decoded image: {}x{}, active {}x{}", width, height, active_width, active_height);

        // Integer data is copied directly, float data (normalised 0.0-1.0) is scaled to u16 range
        let mut samples = Vec::with_capacity(active_width * active_height);
        let (black_levels, white_level) = match &decoded.data {
            RawloaderImageData::Integer(values) => {
                for row in top..top + active_height {
                    let start = row * width + left;
                    samples.extend_from_slice(&values[start..start + active_width]);
                }
                let b = decoded.blacklevels;
                let white = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
                ([b[0], b[1], b[2]], white)
            }
            RawloaderImageData::Float(values) => {
                for row in top..top + active_height {
                    let start = row * width + left;
                    samples.extend(
                        values[start..start + active_width]
                            .iter()
                            .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16),
                    );
                }
                ([0; 3], u16::MAX)
            }
        };

        let xyz_to_cam = {
            let m = decoded.xyz_to_cam;
            let rows = [m[0], m[1], m[2]];
            if rows.iter().flatten().any(|v| *v != 0.0) {
                rows
            } else {
                entry.layout.xyz_to_cam_matrix()
            }
        };

        let bits_per_sample = bits_for_white_level(white_level);
        debug!("Calculated bits_per_sample: {} (max white level: {})", bits_per_sample, white_level);

        Ok(UnpackedImage {
            width: active_width,
            height: active_height,
            samples,
            metadata: SensorMetadata {
                camera: camera.clone(),
                cfa: CfaPattern::from_name(&decoded.cfa.name).shifted(left, top),
                black_levels,
                white_level,
                bits_per_sample,
                as_shot_wb: as_shot_multipliers(decoded.wb_coeffs),
                xyz_to_cam: Some(xyz_to_cam),
                orientation: Orientation::from_exif(decoded.orientation.to_u16() as u32)
                    .unwrap_or_default(),
            },
        })
    }

    fn set_limits(&mut self, limits: DecodeLimits) {
        self.limits = limits;
    }
}
