//! Settings parsing
//!
//! Turns an ordered sequence of string tokens into a validated
//! [`ProcessingOptions`] record.

mod options;
mod parser;

pub use options::{
    BitDepth, ColorSpace, CropBox, DemosaicAlgorithm, FilterType, HighlightMode,
    OrientationOverride, ProcessingOptions, ResizeMode, ToneCurve, WhiteBalance,
};
pub use parser::{parse_settings, SETTINGS_VERSION};
