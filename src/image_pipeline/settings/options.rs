//! Typed processing options produced by the settings parser.

use crate::image_pipeline::common::Orientation;
use crate::image_pipeline::tiff::TiffCompression;

/// White balance source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WhiteBalance {
    /// Multipliers recorded by the camera (falls back to daylight when absent).
    #[default]
    Camera,
    /// Grey-world estimate from the image itself.
    Auto,
    /// Daylight multipliers derived from the camera colour matrix.
    Daylight,
    /// User supplied red/green/blue multipliers.
    Custom([f32; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    pub fn max_value(self) -> f32 {
        match self {
            BitDepth::Eight => u8::MAX as f32,
            BitDepth::Sixteen => u16::MAX as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Camera RGB, no matrix applied.
    Raw,
    #[default]
    Srgb,
    Adobe,
    ProPhoto,
    Xyz,
}

impl ColorSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorSpace::Raw => "raw",
            ColorSpace::Srgb => "sRGB",
            ColorSpace::Adobe => "adobe",
            ColorSpace::ProPhoto => "prophoto",
            ColorSpace::Xyz => "xyz",
        }
    }

    /// Encoding curve used when no explicit gamma was requested.
    pub fn default_curve(self) -> ToneCurve {
        match self {
            ColorSpace::Raw | ColorSpace::Srgb => ToneCurve::Srgb,
            ColorSpace::Adobe => ToneCurve::Power(563.0 / 256.0),
            ColorSpace::ProPhoto => ToneCurve::Power(1.8),
            ColorSpace::Xyz => ToneCurve::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightMode {
    /// Clipped pixels become pure white.
    #[default]
    Clip,
    /// Leave values above the white level alone (clamped only at quantisation).
    Unclip,
    /// Desaturate clipped pixels towards their brightest channel.
    Blend,
    /// Rebuild clipped channels from neighbouring channel ratios.
    Reconstruct { level: u8 },
}

pub const MIN_RECONSTRUCT_LEVEL: u8 = 3;
pub const MAX_RECONSTRUCT_LEVEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemosaicAlgorithm {
    Nearest,
    #[default]
    Linear,
    Cubic,
    /// One output pixel per 2x2 CFA block.
    HalfSize,
}

impl DemosaicAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            DemosaicAlgorithm::Nearest => "nearest",
            DemosaicAlgorithm::Linear => "linear",
            DemosaicAlgorithm::Cubic => "cubic",
            DemosaicAlgorithm::HalfSize => "half",
        }
    }
}

/// Non-linear encoding applied after exposure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneCurve {
    Srgb,
    Bt709,
    Linear,
    Power(f32),
}

/// Crop rectangle in output pixel coordinates (after orientation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    Exact { width: u32, height: u32 },
    /// Scale so the longest edge equals `max_edge`, never upscaling.
    Fit { max_edge: u32 },
}

/// Filter type for resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Nearest => "nearest",
            FilterType::Bilinear => "bilinear",
            FilterType::Lanczos3 => "lanczos3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrientationOverride {
    /// Use the orientation recorded in the RAW file.
    #[default]
    Auto,
    Fixed(Orientation),
}

/// Processing parameters for one conversion.
///
/// `ProcessingOptions::default()` is what an empty settings sequence parses
/// to: camera white balance, 8-bit sRGB, clipped highlights, bilinear
/// demosaic, file orientation, uncompressed TIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOptions {
    pub white_balance: WhiteBalance,
    pub output_bit_depth: BitDepth,
    pub color_space: ColorSpace,
    pub highlights: HighlightMode,
    /// Exposure shift in stops, applied in linear light.
    pub exposure_ev: f32,
    /// Linear brightness multiplier.
    pub brightness: f32,
    pub demosaic: DemosaicAlgorithm,
    /// `None` selects the colour space's own curve.
    pub gamma: Option<ToneCurve>,
    pub crop: Option<CropBox>,
    pub resize: Option<ResizeMode>,
    pub resize_filter: FilterType,
    pub orientation: OrientationOverride,
    pub compression: TiffCompression,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            white_balance: WhiteBalance::Camera,
            output_bit_depth: BitDepth::Eight,
            color_space: ColorSpace::Srgb,
            highlights: HighlightMode::Clip,
            exposure_ev: 0.0,
            brightness: 1.0,
            demosaic: DemosaicAlgorithm::Linear,
            gamma: None,
            crop: None,
            resize: None,
            resize_filter: FilterType::Bilinear,
            orientation: OrientationOverride::Auto,
            compression: TiffCompression::None,
        }
    }
}

impl ProcessingOptions {
    /// Effective encoding curve.
    pub fn tone_curve(&self) -> ToneCurve {
        self.gamma.unwrap_or_else(|| self.color_space.default_curve())
    }

    /// Linear gain applied before the tone curve.
    pub fn linear_gain(&self) -> f32 {
        2f32.powf(self.exposure_ev) * self.brightness
    }

    /// Canonical `key=value` tokens that parse back to `self`.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(13);

        tokens.push(match self.white_balance {
            WhiteBalance::Camera => "wb=camera".to_string(),
            WhiteBalance::Auto => "wb=auto".to_string(),
            WhiteBalance::Daylight => "wb=daylight".to_string(),
            WhiteBalance::Custom([r, g, b]) => format!("wb=custom,{},{},{}", r, g, b),
        });
        tokens.push(format!("outputBitDepth={}", self.output_bit_depth.bits()));
        tokens.push(format!("colorSpace={}", self.color_space.as_str()));
        tokens.push(match self.highlights {
            HighlightMode::Clip => "highlights=clip".to_string(),
            HighlightMode::Unclip => "highlights=unclip".to_string(),
            HighlightMode::Blend => "highlights=blend".to_string(),
            HighlightMode::Reconstruct { level } => format!("highlights=reconstruct,{}", level),
        });
        tokens.push(format!("exposure={}", self.exposure_ev));
        tokens.push(format!("brightness={}", self.brightness));
        tokens.push(format!("demosaic={}", self.demosaic.as_str()));
        if let Some(curve) = self.gamma {
            tokens.push(match curve {
                ToneCurve::Srgb => "gamma=srgb".to_string(),
                ToneCurve::Bt709 => "gamma=bt709".to_string(),
                ToneCurve::Linear => "gamma=linear".to_string(),
                ToneCurve::Power(p) => format!("gamma={}", p),
            });
        }
        if let Some(crop) = self.crop {
            tokens.push(format!(
                "crop={},{},{},{}",
                crop.x, crop.y, crop.width, crop.height
            ));
        }
        if let Some(resize) = self.resize {
            tokens.push(match resize {
                ResizeMode::Exact { width, height } => format!("resize={}x{}", width, height),
                ResizeMode::Fit { max_edge } => format!("resize={}", max_edge),
            });
        }
        tokens.push(format!("resizeFilter={}", self.resize_filter.as_str()));
        tokens.push(match self.orientation {
            OrientationOverride::Auto => "orientation=auto".to_string(),
            OrientationOverride::Fixed(o) => format!("orientation={}", o.exif_value()),
        });
        tokens.push(format!("compression={}", self.compression.as_str()));

        tokens
    }
}
