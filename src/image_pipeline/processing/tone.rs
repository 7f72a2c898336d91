use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::processing::state::{PipelineState, Plane, Stage, StageContext};
use crate::image_pipeline::processing::types::PixelData;
use crate::image_pipeline::settings::{BitDepth, ToneCurve};

const BT709_ALPHA: f32 = 1.099_296_8;
const BT709_BETA: f32 = 0.018_053_97;

/// Encode a linear value in [0, 1] with `curve`.
pub(crate) fn encode(curve: ToneCurve, v: f32) -> f32 {
    match curve {
        ToneCurve::Linear => v,
        ToneCurve::Srgb => {
            if v <= 0.003_130_8 {
                12.92 * v
            } else {
                1.055 * v.powf(1.0 / 2.4) - 0.055
            }
        }
        ToneCurve::Bt709 => {
            if v < BT709_BETA {
                4.5 * v
            } else {
                BT709_ALPHA * v.powf(0.45) - (BT709_ALPHA - 1.0)
            }
        }
        ToneCurve::Power(gamma) => v.powf(1.0 / gamma),
    }
}

/// Clamp to [0, 1]; NaN becomes 0 so quantisation never wraps.
#[inline]
fn unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

pub(super) fn tone_curve(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let rgb = state.take_linear(Stage::ToneCurve)?;
    let gain = ctx.options.linear_gain();
    let curve = ctx.options.tone_curve();
    let depth = ctx.options.output_bit_depth;
    debug!("Tone: gain {:.3}, curve {:?}, {}-bit output", gain, curve, depth.bits());

    let max = depth.max_value();
    let quantise = |v: f32| (unit(encode(curve, unit(v * gain))) * max).round();

    state.plane = Plane::Output(match depth {
        BitDepth::Eight => PixelData::Eight(rgb.into_iter().map(|v| quantise(v) as u8).collect()),
        BitDepth::Sixteen => {
            PixelData::Sixteen(rgb.into_iter().map(|v| quantise(v) as u16).collect())
        }
    });
    // The mask has served its purpose once values are quantised.
    state.clipped = Vec::new();
    Ok(())
}
