//! Image processing pipeline module
//!
//! RAW files go through settings parsing, sensor decoding, the processing
//! stages and TIFF encoding. Embedded previews take a shorter path through
//! the thumbnail extractor.

pub mod common;
pub mod conversions;
pub mod processing;
pub mod raw;
pub mod settings;
pub mod thumbnail;
pub mod tiff;

#[cfg(test)]
pub(crate) mod testing;

pub use common::{ConversionError, ErrorKind, Orientation, PipelineTimings, Result};

pub use settings::{parse_settings, ProcessingOptions, SETTINGS_VERSION};

pub use raw::{RawDecoder, RawImageReader, RawLoaderReader, RawSource, StripReader, UnpackedImage};

pub use processing::{process, process_with_timings, FinishedImage, PixelData};

pub use thumbnail::{extract_thumbnail, Thumbnail};

pub use tiff::{
    ConversionConfig, ConversionConfigBuilder, StandardTiffWriter, ThumbnailFormat,
    TiffCompression, TiffWriter,
};

pub use conversions::{
    camera_count, convert_raw_to_tiff, create_thumbnail, library_version, supported_cameras,
    RawToTiffPipeline,
};
