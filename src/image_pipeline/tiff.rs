//! TIFF writing module
//!
//! Encodes finished RGB images with the `tiff` crate, plus the conversion
//! configuration shared by the orchestrator.

mod standard_tiff_writer;
pub mod types;
mod writer;

pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{
    ConversionConfig, ConversionConfigBuilder, ThumbnailFormat, TiffCompression,
    DEFAULT_MAX_DIMENSION, DEFAULT_MAX_PIXELS,
};
pub use writer::TiffWriter;
