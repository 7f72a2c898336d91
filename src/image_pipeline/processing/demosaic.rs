//! Demosaicing of the Bayer mosaic into linear RGB.
//!
//! Interpolating algorithms run through the `bayer` crate (parallel rows with
//! its rayon feature); half-size output is a plain 2x2 superpixel.

use std::io::Cursor;

use bayer::{BayerDepth, Demosaic, RasterDepth, RasterMut};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::processing::state::{
    PipelineState, Plane, Stage, StageContext, CLIPPED_BLUE, CLIPPED_GREEN, CLIPPED_RED,
};
use crate::image_pipeline::raw::{BayerPattern, CfaPattern, SensorMetadata};
use crate::image_pipeline::settings::DemosaicAlgorithm;

const CLIP_BITS: [u8; 3] = [CLIPPED_RED, CLIPPED_GREEN, CLIPPED_BLUE];

/// Smallest side `bayer` accepts for cubic interpolation.
const CUBIC_MIN_SIDE: usize = 4;

/// Per-colour black subtraction and scaling so the white level maps to 1.0.
struct Levels {
    black: [f32; 3],
    scale: [f32; 3],
    white: u16,
}

impl Levels {
    fn new(metadata: &SensorMetadata) -> Self {
        let white = metadata.white_level;
        let black = metadata.black_levels.map(|b| b as f32);
        let scale = black.map(|b| 1.0 / (white as f32 - b).max(1.0));
        Self { black, scale, white }
    }

    #[inline]
    fn normalise(&self, value: u16, color: usize) -> f32 {
        (value as f32 - self.black[color]).max(0.0) * self.scale[color]
    }
}

pub(super) fn demosaic(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let pattern = match &ctx.metadata.cfa {
        CfaPattern::Bayer(pattern) => *pattern,
        CfaPattern::Other(name) => {
            return Err(ConversionError::processing(
                Stage::Demosaic,
                format!("{} colour filter layout cannot be demosaiced", name),
            ));
        }
    };
    let samples = state.take_mosaic(Stage::Demosaic)?;
    let (width, height) = (state.width, state.height);
    if width < 2 || height < 2 {
        return Err(ConversionError::processing(
            Stage::Demosaic,
            format!("{}x{} mosaic is below the 2x2 minimum", width, height),
        ));
    }
    if samples.len() != width * height {
        return Err(ConversionError::processing(
            Stage::Demosaic,
            format!("{} samples do not form a {}x{} mosaic", samples.len(), width, height),
        ));
    }

    let levels = Levels::new(ctx.metadata);
    let algorithm = ctx.options.demosaic;
    debug!("Demosaicing {}x{} {} mosaic, algo={:?}", width, height, pattern.name(), algorithm);

    let interpolation = match algorithm {
        DemosaicAlgorithm::Nearest => Some(Demosaic::NearestNeighbour),
        DemosaicAlgorithm::Linear => Some(Demosaic::Linear),
        DemosaicAlgorithm::Cubic if width < CUBIC_MIN_SIDE || height < CUBIC_MIN_SIDE => {
            debug!("{}x{} is too small for cubic, using linear", width, height);
            Some(Demosaic::Linear)
        }
        DemosaicAlgorithm::Cubic => Some(Demosaic::Cubic),
        DemosaicAlgorithm::HalfSize => None,
    };
    let (width, height, rgb, clipped) = match interpolation {
        Some(method) => interpolate(&samples, width, height, pattern, method, &levels)?,
        None => half_size(&samples, width, height, pattern, &levels),
    };

    state.width = width;
    state.height = height;
    state.plane = Plane::Linear(rgb);
    state.clipped = clipped;
    Ok(())
}

fn interpolate(
    samples: &[u16],
    width: usize,
    height: usize,
    pattern: BayerPattern,
    algorithm: Demosaic,
    levels: &Levels,
) -> Result<(usize, usize, Vec<f32>, Vec<u8>)> {
    // Convert u16 data to u8 bytes for bayer crate
    let bayer_bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut output_buf = vec![0u8; width * height * 3 * 2];

    let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
    bayer::run_demosaic(
        &mut Cursor::new(&bayer_bytes[..]),
        BayerDepth::Depth16LE,
        pattern.to_bayer_cfa(),
        algorithm,
        &mut output_raster,
    )
    .map_err(|e| ConversionError::processing(Stage::Demosaic, format!("{:?}", e)))?;

    // The raster holds native-endian u16 samples.
    let mut rgb = Vec::with_capacity(width * height * 3);
    let mut clipped = Vec::with_capacity(width * height);
    for pixel in output_buf.chunks_exact(6) {
        let mut mask = 0u8;
        for color in 0..3 {
            let value = u16::from_ne_bytes([pixel[color * 2], pixel[color * 2 + 1]]);
            if value >= levels.white {
                mask |= CLIP_BITS[color];
            }
            rgb.push(levels.normalise(value, color));
        }
        clipped.push(mask);
    }

    Ok((width, height, rgb, clipped))
}

/// One RGB pixel per 2x2 block, greens averaged. Odd trailing rows and
/// columns are dropped.
fn half_size(
    samples: &[u16],
    width: usize,
    height: usize,
    pattern: BayerPattern,
    levels: &Levels,
) -> (usize, usize, Vec<f32>, Vec<u8>) {
    let out_width = width / 2;
    let out_height = height / 2;
    let mut rgb = Vec::with_capacity(out_width * out_height * 3);
    let mut clipped = Vec::with_capacity(out_width * out_height);

    for by in 0..out_height {
        for bx in 0..out_width {
            let mut sum = [0.0f32; 3];
            let mut count = [0u8; 3];
            let mut mask = 0u8;
            for dy in 0..2 {
                for dx in 0..2 {
                    let (row, col) = (by * 2 + dy, bx * 2 + dx);
                    let value = samples[row * width + col];
                    let color = pattern.color_at(row, col);
                    if value >= levels.white {
                        mask |= CLIP_BITS[color];
                    }
                    sum[color] += levels.normalise(value, color);
                    count[color] += 1;
                }
            }
            for color in 0..3 {
                rgb.push(sum[color] / count[color].max(1) as f32);
            }
            clipped.push(mask);
        }
    }

    (out_width, out_height, rgb, clipped)
}
