//! RAW image data types

use std::fmt;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::tiff::ConversionConfig;

/// Camera make and model, normalised for table lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraId {
    pub make: String,
    pub model: String,
}

/// Vendor spellings of the make as found in IFD0, mapped to the short name
/// used by the camera table.
const MAKE_ALIASES: &[(&str, &str)] = &[
    ("CANON", "Canon"),
    ("FUJIFILM", "Fujifilm"),
    ("LEICA", "Leica"),
    ("NIKON", "Nikon"),
    ("OLYMPUS", "Olympus"),
    ("OM DIGITAL", "Olympus"),
    ("PANASONIC", "Panasonic"),
    ("PENTAX", "Pentax"),
    ("RICOH", "Pentax"),
    ("SONY", "Sony"),
];

impl CameraId {
    /// Build from the raw strings stored in the file.
    ///
    /// Trailing NULs and whitespace are dropped, the make is mapped onto its
    /// short name, and a model that repeats the make ("Canon EOS R5") loses
    /// the prefix.
    pub fn new(make: &str, model: &str) -> Self {
        let make = make.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        let model = model.trim_matches(|c: char| c == '\0' || c.is_whitespace());

        let upper = make.to_ascii_uppercase();
        let clean_make = MAKE_ALIASES
            .iter()
            .find(|(prefix, _)| upper.starts_with(prefix))
            .map(|(_, clean)| clean.to_string())
            .unwrap_or_else(|| make.to_string());

        let prefix = format!("{} ", clean_make.to_ascii_uppercase());
        let clean_model = if model.to_ascii_uppercase().starts_with(&prefix) {
            model[prefix.len()..].trim_start().to_string()
        } else {
            model.to_string()
        };

        Self {
            make: clean_make,
            model: clean_model,
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.make, self.model)
    }
}

/// 2x2 Bayer tilings, named by the colours of the top-left block read row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerPattern {
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;

impl BayerPattern {
    /// Colour index (0 red, 1 green, 2 blue) of each cell of the 2x2 block.
    pub fn colors(self) -> [[usize; 2]; 2] {
        match self {
            BayerPattern::Rggb => [[RED, GREEN], [GREEN, BLUE]],
            BayerPattern::Bggr => [[BLUE, GREEN], [GREEN, RED]],
            BayerPattern::Grbg => [[GREEN, RED], [BLUE, GREEN]],
            BayerPattern::Gbrg => [[GREEN, BLUE], [RED, GREEN]],
        }
    }

    fn from_colors(colors: [[usize; 2]; 2]) -> Self {
        [
            BayerPattern::Rggb,
            BayerPattern::Bggr,
            BayerPattern::Grbg,
            BayerPattern::Gbrg,
        ]
        .into_iter()
        .find(|p| p.colors() == colors)
        .unwrap_or(BayerPattern::Rggb)
    }

    /// Pattern seen from an origin moved `dx` columns right and `dy` rows down.
    pub fn shifted(self, dx: usize, dy: usize) -> Self {
        let c = self.colors();
        let mut out = [[0; 2]; 2];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, cell) in out_row.iter_mut().enumerate() {
                *cell = c[(row + dy) % 2][(col + dx) % 2];
            }
        }
        Self::from_colors(out)
    }

    pub fn color_at(self, row: usize, col: usize) -> usize {
        self.colors()[row % 2][col % 2]
    }

    pub fn name(self) -> &'static str {
        match self {
            BayerPattern::Rggb => "RGGB",
            BayerPattern::Bggr => "BGGR",
            BayerPattern::Grbg => "GRBG",
            BayerPattern::Gbrg => "GBRG",
        }
    }

    pub fn to_bayer_cfa(self) -> bayer::CFA {
        match self {
            BayerPattern::Rggb => bayer::CFA::RGGB,
            BayerPattern::Bggr => bayer::CFA::BGGR,
            BayerPattern::Grbg => bayer::CFA::GRBG,
            BayerPattern::Gbrg => bayer::CFA::GBRG,
        }
    }
}

/// Colour filter array over the active area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfaPattern {
    Bayer(BayerPattern),
    /// Any tiling the demosaic stage cannot handle (X-Trans, 4-colour...).
    Other(String),
}

impl CfaPattern {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "RGGB" => CfaPattern::Bayer(BayerPattern::Rggb),
            "BGGR" => CfaPattern::Bayer(BayerPattern::Bggr),
            "GRBG" => CfaPattern::Bayer(BayerPattern::Grbg),
            "GBRG" => CfaPattern::Bayer(BayerPattern::Gbrg),
            _ => CfaPattern::Other(name.to_string()),
        }
    }

    pub fn shifted(&self, dx: usize, dy: usize) -> Self {
        match self {
            CfaPattern::Bayer(pattern) => CfaPattern::Bayer(pattern.shifted(dx, dy)),
            other => other.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CfaPattern::Bayer(pattern) => pattern.name(),
            CfaPattern::Other(name) => name,
        }
    }
}

/// Everything the processing stages need besides the sample buffer.
#[derive(Debug, Clone)]
pub struct SensorMetadata {
    pub camera: CameraId,
    pub cfa: CfaPattern,
    /// Black level per colour (red, green, blue)
    pub black_levels: [u16; 3],
    /// Sample value at which the sensor saturates
    pub white_level: u16,
    /// Actual bits per sample from the sensor (e.g., 12, 14, or 16)
    pub bits_per_sample: u32,
    /// As-shot multipliers normalised to green = 1
    pub as_shot_wb: Option<[f32; 3]>,
    /// XYZ (D65) to camera RGB, rows are camera channels
    pub xyz_to_cam: Option<[[f32; 3]; 3]>,
    pub orientation: Orientation,
}

/// Sensor samples of the active area plus metadata.
#[derive(Debug, Clone)]
pub struct UnpackedImage {
    /// Width of the active area in pixels
    pub width: usize,
    /// Height of the active area in pixels
    pub height: usize,
    /// Raw pixel data (single channel CFA mosaic), row-major
    pub samples: Vec<u16>,
    pub metadata: SensorMetadata,
}

impl UnpackedImage {
    pub fn into_parts(self) -> (Vec<u16>, SensorMetadata) {
        (self.samples, self.metadata)
    }
}

/// Bits needed to hold `white_level`, e.g. 4095 gives 12 and 16383 gives 14.
pub fn bits_for_white_level(white_level: u16) -> u32 {
    if white_level == 0 {
        16
    } else {
        u16::BITS - white_level.leading_zeros()
    }
}

/// Sanity bounds for declared sensor dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: usize,
    pub max_pixels: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&ConversionConfig::default())
    }
}

impl From<&ConversionConfig> for DecodeLimits {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            max_pixels: config.max_pixels,
        }
    }
}

impl DecodeLimits {
    /// Reject implausible declared dimensions before anything is allocated.
    pub fn check(&self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConversionError::CorruptFile(format!(
                "declared sensor size {}x{} is empty",
                width, height
            )));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ConversionError::CorruptFile(format!(
                "declared sensor size {}x{} exceeds the {} pixel side limit",
                width, height, self.max_dimension
            )));
        }
        match width.checked_mul(height) {
            Some(pixels) if pixels <= self.max_pixels => Ok(()),
            _ => Err(ConversionError::CorruptFile(format!(
                "declared sensor size {}x{} exceeds the {} pixel area limit",
                width, height, self.max_pixels
            ))),
        }
    }
}
