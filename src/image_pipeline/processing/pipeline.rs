use tracing::{info, info_span, instrument};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::timing::{PipelineTimings, Timer};
use crate::image_pipeline::processing::color::color_transform;
use crate::image_pipeline::processing::demosaic::demosaic;
use crate::image_pipeline::processing::geometry::geometry;
use crate::image_pipeline::processing::highlights::highlight_recovery;
use crate::image_pipeline::processing::state::{PipelineState, Plane, Stage, StageContext};
use crate::image_pipeline::processing::tone::tone_curve;
use crate::image_pipeline::processing::types::FinishedImage;
use crate::image_pipeline::processing::white_balance::white_balance;
use crate::image_pipeline::raw::UnpackedImage;
use crate::image_pipeline::settings::ProcessingOptions;

pub type StageFn = fn(&mut PipelineState, &StageContext<'_>) -> Result<()>;

/// Processing stages in execution order.
pub const STAGES: [(Stage, StageFn); 6] = [
    (Stage::Demosaic, demosaic),
    (Stage::WhiteBalance, white_balance),
    (Stage::ColorTransform, color_transform),
    (Stage::HighlightRecovery, highlight_recovery),
    (Stage::ToneCurve, tone_curve),
    (Stage::Geometry, geometry),
];

/// Run every stage over `image` and return the finished RGB image.
pub fn process(image: UnpackedImage, options: &ProcessingOptions) -> Result<FinishedImage> {
    process_with_timings(image, options).map(|(finished, _)| finished)
}

#[instrument(skip_all, fields(width = image.width, height = image.height))]
pub fn process_with_timings(
    image: UnpackedImage,
    options: &ProcessingOptions,
) -> Result<(FinishedImage, PipelineTimings)> {
    let mut timings = PipelineTimings::new();
    let (width, height) = (image.width, image.height);
    let (samples, metadata) = image.into_parts();
    let ctx = StageContext {
        options,
        metadata: &metadata,
    };
    let mut state = PipelineState::new(width, height, samples);

    for (stage, run) in STAGES {
        let _span = info_span!("stage", name = stage.name()).entered();
        let timer = Timer::start(stage.name());
        run(&mut state, &ctx)?;
        timer.record(&mut timings);
    }

    let finished = finish(state)?;
    info!(
        "Processed {} to {}x{} {}-bit in {:.3}ms",
        metadata.camera,
        finished.width,
        finished.height,
        finished.bit_depth().bits(),
        timings.total_duration().as_secs_f64() * 1000.0
    );
    Ok((finished, timings))
}

fn finish(state: PipelineState) -> Result<FinishedImage> {
    let Plane::Output(pixels) = state.plane else {
        return Err(ConversionError::processing(
            Stage::Geometry,
            format!("pipeline ended with a {} plane", state.plane.kind()),
        ));
    };
    let finished = FinishedImage {
        width: state.width as u32,
        height: state.height as u32,
        pixels,
    };
    if !finished.is_consistent() {
        return Err(ConversionError::processing(
            Stage::Geometry,
            format!(
                "{} samples do not match {}x{}",
                finished.pixels.len(),
                finished.width,
                finished.height
            ),
        ));
    }
    Ok(finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::Orientation;
    use crate::image_pipeline::processing::types::PixelData;
    use crate::image_pipeline::raw::{BayerPattern, CameraId, CfaPattern, SensorMetadata};
    use crate::image_pipeline::settings::{parse_settings, BitDepth, CropBox, DemosaicAlgorithm};

    fn unpacked(width: usize, height: usize, orientation: Orientation) -> UnpackedImage {
        let samples = (0..width * height)
            .map(|i| match ((i / width) % 2, (i % width) % 2) {
                (0, 0) => 3500,
                (1, 1) => 3000,
                _ => 6500,
            })
            .collect();
        UnpackedImage {
            width,
            height,
            samples,
            metadata: SensorMetadata {
                camera: CameraId::new("SONY", "ILCE-7M3"),
                cfa: CfaPattern::Bayer(BayerPattern::Rggb),
                black_levels: [512; 3],
                white_level: 16383,
                bits_per_sample: 14,
                as_shot_wb: Some([2.0, 1.0, 1.5]),
                xyz_to_cam: Some([
                    [0.7374, -0.2389, -0.0551],
                    [-0.5435, 1.3162, 0.2519],
                    [-0.1006, 0.1795, 0.6552],
                ]),
                orientation,
            },
        }
    }

    #[test]
    fn test_stage_order() {
        let order: Vec<Stage> = STAGES.iter().map(|(stage, _)| *stage).collect();
        assert_eq!(
            order,
            vec![
                Stage::Demosaic,
                Stage::WhiteBalance,
                Stage::ColorTransform,
                Stage::HighlightRecovery,
                Stage::ToneCurve,
                Stage::Geometry,
            ]
        );
    }

    #[test]
    fn test_default_options_give_eight_bit_active_area() {
        let finished =
            process(unpacked(16, 12, Orientation::Normal), &ProcessingOptions::default()).unwrap();
        assert_eq!((finished.width, finished.height), (16, 12));
        assert_eq!(finished.bit_depth(), BitDepth::Eight);
        assert!(finished.is_consistent());
    }

    #[test]
    fn test_sixteen_bit_srgb_camera_wb() {
        let options = parse_settings(&["wb=camera", "outputBitDepth=16", "colorSpace=sRGB"]).unwrap();
        let finished = process(unpacked(16, 12, Orientation::Normal), &options).unwrap();
        assert_eq!((finished.width, finished.height), (16, 12));
        match &finished.pixels {
            PixelData::Sixteen(data) => {
                assert_eq!(data.len(), 16 * 12 * 3);
                assert!(data.iter().any(|&v| v > 0));
            }
            other => panic!("expected 16-bit pixels, got {:?}", other.bit_depth()),
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        let options = parse_settings(&["-a", "-H", "5", "demosaic=cubic"]).unwrap();
        let a = process(unpacked(20, 14, Orientation::Normal), &options).unwrap();
        let b = process(unpacked(20, 14, Orientation::Normal), &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_orientation_half_size_and_crop() {
        let options = ProcessingOptions {
            demosaic: DemosaicAlgorithm::HalfSize,
            crop: Some(CropBox {
                x: 1,
                y: 0,
                width: 2,
                height: 5,
            }),
            ..ProcessingOptions::default()
        };
        // 16x12 -> 8x6 half size -> 6x8 rotated -> 2x5 crop
        let finished = process(unpacked(16, 12, Orientation::Rotate90CW), &options).unwrap();
        assert_eq!((finished.width, finished.height), (2, 5));
    }

    #[test]
    fn test_timings_cover_every_stage() {
        let (_, timings) =
            process_with_timings(unpacked(8, 8, Orientation::Normal), &ProcessingOptions::default())
                .unwrap();
        assert_eq!(timings.steps().len(), STAGES.len());
        for (stage, _) in STAGES {
            assert!(timings.get_step(stage.name()).is_some());
        }
    }

    #[test]
    fn test_non_bayer_fails_in_demosaic() {
        let mut image = unpacked(6, 6, Orientation::Normal);
        image.metadata.cfa = CfaPattern::Other("X-Trans".to_string());
        let err = process(image, &ProcessingOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::ProcessingFailure { stage: Stage::Demosaic, .. }
        ));
    }
}
