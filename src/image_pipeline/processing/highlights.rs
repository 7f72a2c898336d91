//! Treatment of pixels whose channels reached the sensor white level.

use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::processing::state::{PipelineState, Stage, StageContext};
use crate::image_pipeline::settings::HighlightMode;

const ALL_CLIPPED: u8 = 0b111;

pub(super) fn highlight_recovery(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let (width, height) = (state.width, state.height);
    let (rgb, clipped) = state.linear_mut(Stage::HighlightRecovery)?;
    let affected = clipped.iter().filter(|&&m| m != 0).count();
    debug!("{} of {} pixels clipped, mode {:?}", affected, clipped.len(), ctx.options.highlights);

    match ctx.options.highlights {
        HighlightMode::Clip => clip(rgb, clipped),
        HighlightMode::Unclip => {}
        HighlightMode::Blend => blend(rgb, clipped),
        HighlightMode::Reconstruct { level } => {
            reconstruct(rgb, clipped, width, height, level as usize)
        }
    }
    Ok(())
}

fn clip(rgb: &mut [f32], clipped: &[u8]) {
    for (px, &mask) in rgb.chunks_exact_mut(3).zip(clipped) {
        if mask != 0 {
            px.fill(1.0);
        } else {
            px.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
        }
    }
}

/// Pull clipped pixels towards their brightest channel, one third per
/// clipped channel.
fn blend(rgb: &mut [f32], clipped: &[u8]) {
    for (px, &mask) in rgb.chunks_exact_mut(3).zip(clipped) {
        if mask == 0 {
            continue;
        }
        let f = mask.count_ones() as f32 / 3.0;
        let peak = px.iter().copied().fold(f32::MIN, f32::max);
        px.iter_mut().for_each(|v| *v = (1.0 - f) * *v + f * peak);
    }
}

/// Rebuild clipped channels from the channel ratios of unclipped neighbours
/// within `radius`. Pixels with every channel clipped, or with no usable
/// neighbour, fall back to [`blend`].
fn reconstruct(rgb: &mut [f32], clipped: &[u8], width: usize, height: usize, radius: usize) {
    let source = rgb.to_vec();
    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let mask = clipped[index];
            if mask == 0 {
                continue;
            }
            let px = &source[index * 3..index * 3 + 3];
            if mask == ALL_CLIPPED {
                blend(&mut rgb[index * 3..index * 3 + 3], &clipped[index..=index]);
                continue;
            }

            // Reference channel: green if it survived, otherwise any unclipped one.
            let reference = [1usize, 0, 2]
                .into_iter()
                .find(|&c| mask & (1 << c) == 0)
                .unwrap_or(1);

            let mut ratio_sum = [0.0f32; 3];
            let mut samples = 0usize;
            for ny in y.saturating_sub(radius)..(y + radius + 1).min(height) {
                for nx in x.saturating_sub(radius)..(x + radius + 1).min(width) {
                    let n = ny * width + nx;
                    if clipped[n] != 0 {
                        continue;
                    }
                    let neighbour = &source[n * 3..n * 3 + 3];
                    if neighbour[reference] <= f32::EPSILON {
                        continue;
                    }
                    for c in 0..3 {
                        ratio_sum[c] += neighbour[c] / neighbour[reference];
                    }
                    samples += 1;
                }
            }

            let out = &mut rgb[index * 3..index * 3 + 3];
            if samples == 0 {
                blend(out, &clipped[index..=index]);
                continue;
            }
            for c in 0..3 {
                if mask & (1 << c) != 0 {
                    let estimate = px[reference] * ratio_sum[c] / samples as f32;
                    out[c] = estimate.max(px[c]);
                }
            }
        }
    }
}
