use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::source::RawSource;
use crate::image_pipeline::raw::types::{DecodeLimits, UnpackedImage};

/// Turns the bytes of a RAW file into the active-area sensor mosaic.
pub trait RawImageReader {
    fn read_raw(&self, source: &RawSource) -> Result<UnpackedImage>;

    /// Replace the dimension bounds checked before allocation. Readers that
    /// never allocate from declared sizes can ignore this.
    fn set_limits(&mut self, _limits: DecodeLimits) {}
}
