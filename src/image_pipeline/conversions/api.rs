//! Entry points for callers that only hold paths and setting tokens.

use std::path::Path;

use crate::image_pipeline::common::Result;
use crate::image_pipeline::conversions::raw_to_tiff::RawToTiffPipeline;
use crate::image_pipeline::raw;

/// Convert `input_path` to a TIFF at `output_path` using `settings` tokens.
pub fn convert_raw_to_tiff<S: AsRef<str>>(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    settings: &[S],
) -> Result<()> {
    RawToTiffPipeline::default().convert_file(input_path, output_path, settings)
}

/// Write the embedded preview of `input_path` to `output_path`.
pub fn create_thumbnail(input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<()> {
    RawToTiffPipeline::default().thumbnail_file(input_path, output_path)
}

pub fn library_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// "Make Model" of every supported camera, sorted.
pub fn supported_cameras() -> Vec<String> {
    raw::supported_cameras()
}

pub fn camera_count() -> usize {
    raw::camera_count()
}
