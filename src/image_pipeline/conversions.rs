//! Pipeline conversions module
//!
//! This module contains orchestration logic for RAW conversions and the
//! plain-function entry points built on it.

mod api;
mod raw_to_tiff;


pub use api::{camera_count, convert_raw_to_tiff, create_thumbnail, library_version, supported_cameras};
pub use raw_to_tiff::RawToTiffPipeline;
