use std::io::Write;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::processing::FinishedImage;
use crate::image_pipeline::tiff::types::{ConversionConfig, TiffCompression};

pub trait TiffWriter {
    fn write_tiff(
        &self,
        image: &FinishedImage,
        output: &mut dyn Write,
        compression: TiffCompression,
        config: &ConversionConfig,
    ) -> Result<()>;
}
