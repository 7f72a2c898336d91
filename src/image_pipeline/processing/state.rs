//! State threaded through the processing stages.

use std::fmt;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::processing::types::PixelData;
use crate::image_pipeline::raw::SensorMetadata;
use crate::image_pipeline::settings::ProcessingOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Demosaic,
    WhiteBalance,
    ColorTransform,
    HighlightRecovery,
    ToneCurve,
    Geometry,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Demosaic => "demosaic",
            Stage::WhiteBalance => "white balance",
            Stage::ColorTransform => "color transform",
            Stage::HighlightRecovery => "highlight recovery",
            Stage::ToneCurve => "tone curve",
            Stage::Geometry => "geometry",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    /// Single-channel CFA samples straight from the decoder
    Mosaic(Vec<u16>),
    /// Interleaved linear RGB, 1.0 is sensor saturation after black subtraction
    Linear(Vec<f32>),
    /// Quantised interleaved RGB
    Output(PixelData),
}

impl Default for Plane {
    fn default() -> Self {
        Plane::Mosaic(Vec::new())
    }
}

impl Plane {
    pub fn kind(&self) -> &'static str {
        match self {
            Plane::Mosaic(_) => "mosaic",
            Plane::Linear(_) => "linear RGB",
            Plane::Output(_) => "quantised RGB",
        }
    }
}

pub const CLIPPED_RED: u8 = 1;
pub const CLIPPED_GREEN: u8 = 1 << 1;
pub const CLIPPED_BLUE: u8 = 1 << 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub width: usize,
    pub height: usize,
    pub plane: Plane,
    /// Per pixel bit mask of channels that reached the white level
    pub clipped: Vec<u8>,
}

fn wrong_plane(stage: Stage, expected: &str, found: &Plane) -> ConversionError {
    ConversionError::processing(
        stage,
        format!("expected {} input, found {}", expected, found.kind()),
    )
}

impl PipelineState {
    pub fn new(width: usize, height: usize, samples: Vec<u16>) -> Self {
        Self {
            width,
            height,
            plane: Plane::Mosaic(samples),
            clipped: Vec::new(),
        }
    }

    pub(crate) fn take_mosaic(&mut self, stage: Stage) -> Result<Vec<u16>> {
        match std::mem::take(&mut self.plane) {
            Plane::Mosaic(samples) => Ok(samples),
            other => {
                let err = wrong_plane(stage, "mosaic", &other);
                self.plane = other;
                Err(err)
            }
        }
    }

    pub(crate) fn take_linear(&mut self, stage: Stage) -> Result<Vec<f32>> {
        match std::mem::take(&mut self.plane) {
            Plane::Linear(rgb) => Ok(rgb),
            other => {
                let err = wrong_plane(stage, "linear RGB", &other);
                self.plane = other;
                Err(err)
            }
        }
    }

    pub(crate) fn take_output(&mut self, stage: Stage) -> Result<PixelData> {
        match std::mem::take(&mut self.plane) {
            Plane::Output(pixels) => Ok(pixels),
            other => {
                let err = wrong_plane(stage, "quantised RGB", &other);
                self.plane = other;
                Err(err)
            }
        }
    }

    /// Linear RGB together with the clip mask.
    pub(crate) fn linear_mut(&mut self, stage: Stage) -> Result<(&mut [f32], &[u8])> {
        match &mut self.plane {
            Plane::Linear(rgb) => Ok((rgb.as_mut_slice(), self.clipped.as_slice())),
            other => Err(wrong_plane(stage, "linear RGB", other)),
        }
    }
}

/// Read-only inputs shared by every stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub options: &'a ProcessingOptions,
    pub metadata: &'a SensorMetadata,
}
