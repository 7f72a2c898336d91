use tracing::{debug, warn};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::processing::color::camera_from_srgb;
use crate::image_pipeline::processing::state::{PipelineState, Stage, StageContext};
use crate::image_pipeline::raw::SensorMetadata;
use crate::image_pipeline::settings::WhiteBalance;

const NEUTRAL: [f32; 3] = [1.0, 1.0, 1.0];

/// Pixels darker than this in any channel carry too much noise for grey world.
const AUTO_MIN_LEVEL: f32 = 1.0 / 256.0;

fn normalise_to_green(m: [f32; 3]) -> [f32; 3] {
    if m.iter().all(|v| v.is_finite() && *v > 0.0) {
        [m[0] / m[1], 1.0, m[2] / m[1]]
    } else {
        NEUTRAL
    }
}

/// Multipliers that make sRGB white neutral in camera space.
fn daylight(metadata: &SensorMetadata) -> [f32; 3] {
    let Some(xyz_to_cam) = metadata.xyz_to_cam.as_ref() else {
        return NEUTRAL;
    };
    let cam = camera_from_srgb(xyz_to_cam);
    let response = cam.map(|row| row.iter().sum::<f32>());
    normalise_to_green(response.map(|r| 1.0 / r))
}

/// Grey-world estimate over unclipped pixels that are not near black.
fn grey_world(rgb: &[f32], clipped: &[u8]) -> [f32; 3] {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for (px, &mask) in rgb.chunks_exact(3).zip(clipped) {
        if mask != 0 || px.iter().any(|&v| v < AUTO_MIN_LEVEL) {
            continue;
        }
        for c in 0..3 {
            sum[c] += px[c] as f64;
        }
        count += 1;
    }
    if count == 0 || sum.iter().any(|&s| s <= 0.0) {
        return NEUTRAL;
    }
    normalise_to_green([
        (sum[1] / sum[0]) as f32,
        1.0,
        (sum[1] / sum[2]) as f32,
    ])
}

pub(super) fn white_balance(state: &mut PipelineState, ctx: &StageContext<'_>) -> Result<()> {
    let (rgb, clipped) = state.linear_mut(Stage::WhiteBalance)?;

    let multipliers = match ctx.options.white_balance {
        WhiteBalance::Camera => match ctx.metadata.as_shot_wb {
            Some(m) => normalise_to_green(m),
            None => {
                warn!("No as-shot white balance in file, using daylight");
                daylight(ctx.metadata)
            }
        },
        WhiteBalance::Auto => grey_world(rgb, clipped),
        WhiteBalance::Daylight => daylight(ctx.metadata),
        WhiteBalance::Custom(m) => normalise_to_green(m),
    };
    debug!("White balance multipliers: {:?}", multipliers);

    for px in rgb.chunks_exact_mut(3) {
        for (v, m) in px.iter_mut().zip(multipliers) {
            *v *= m;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::Orientation;
    use crate::image_pipeline::processing::state::{Plane, CLIPPED_RED};
    use crate::image_pipeline::raw::{BayerPattern, CameraId, CfaPattern};
    use crate::image_pipeline::settings::ProcessingOptions;

    fn metadata(as_shot: Option<[f32; 3]>, matrix: bool) -> SensorMetadata {
        SensorMetadata {
            camera: CameraId::new("Sony", "ILCE-7M3"),
            cfa: CfaPattern::Bayer(BayerPattern::Rggb),
            black_levels: [512; 3],
            white_level: 16383,
            bits_per_sample: 14,
            as_shot_wb: as_shot,
            xyz_to_cam: matrix.then_some([
                [0.7374, -0.2389, -0.0551],
                [-0.5435, 1.3162, 0.2519],
                [-0.1006, 0.1795, 0.6552],
            ]),
            orientation: Orientation::Normal,
        }
    }

    fn run(wb: WhiteBalance, meta: &SensorMetadata, rgb: Vec<f32>, clipped: Vec<u8>) -> Vec<f32> {
        let options = ProcessingOptions {
            white_balance: wb,
            ..ProcessingOptions::default()
        };
        let ctx = StageContext {
            options: &options,
            metadata: meta,
        };
        let mut state = PipelineState {
            width: clipped.len(),
            height: 1,
            plane: Plane::Linear(rgb),
            clipped,
        };
        white_balance(&mut state, &ctx).unwrap();
        match state.plane {
            Plane::Linear(rgb) => rgb,
            other => panic!("unexpected plane {}", other.kind()),
        }
    }

    #[test]
    fn test_camera_uses_as_shot() {
        let meta = metadata(Some([2.0, 1.0, 1.5]), true);
        let out = run(WhiteBalance::Camera, &meta, vec![0.25, 0.5, 0.25], vec![0]);
        assert_eq!(out, vec![0.5, 0.5, 0.375]);
    }

    #[test]
    fn test_camera_falls_back_to_daylight() {
        let meta = metadata(None, true);
        let camera = run(WhiteBalance::Camera, &meta, vec![0.5; 3], vec![0]);
        let daylight = run(WhiteBalance::Daylight, &meta, vec![0.5; 3], vec![0]);
        assert_eq!(camera, daylight);
        assert_eq!(camera[1], 0.5);
        assert!(camera[0] > 0.5 && camera[2] > 0.5);
    }

    #[test]
    fn test_daylight_without_matrix_is_neutral() {
        let meta = metadata(None, false);
        let out = run(WhiteBalance::Daylight, &meta, vec![0.1, 0.2, 0.3], vec![0]);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_auto_ignores_clipped_and_black() {
        let meta = metadata(None, false);
        let rgb = vec![
            0.2, 0.4, 0.1, // usable
            1.0, 0.9, 0.9, // clipped
            0.0, 0.3, 0.3, // black red channel
        ];
        let out = run(WhiteBalance::Auto, &meta, rgb, vec![0, CLIPPED_RED, 0]);
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert!((out[2] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_auto_with_nothing_usable_is_neutral() {
        let meta = metadata(None, false);
        let out = run(WhiteBalance::Auto, &meta, vec![0.0; 3], vec![0]);
        assert_eq!(out, vec![0.0; 3]);
    }

    #[test]
    fn test_custom_normalised_to_green() {
        let meta = metadata(None, false);
        let out = run(WhiteBalance::Custom([4.0, 2.0, 3.0]), &meta, vec![0.25; 3], vec![0]);
        assert_eq!(out, vec![0.5, 0.25, 0.375]);
    }
}
