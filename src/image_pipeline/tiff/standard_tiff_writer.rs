use std::io::{Cursor, Write};

use tiff::encoder::colortype::{ColorType, RGB16, RGB8};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, Rational, TiffEncoder, TiffValue};
use tiff::tags::{Predictor, ResolutionUnit, Tag};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::processing::{FinishedImage, PixelData};
use crate::image_pipeline::tiff::types::{ConversionConfig, TiffCompression};
use crate::image_pipeline::tiff::writer::TiffWriter;

const SOFTWARE: &str = concat!("raw_converter_rs ", env!("CARGO_PKG_VERSION"));

/// Pixels reach the writer already upright.
const ORIENTATION_TOP_LEFT: u16 = 1;

fn encode_error(e: tiff::TiffError) -> ConversionError {
    ConversionError::WriteFailure(e.to_string())
}

pub struct StandardTiffWriter;

impl StandardTiffWriter {
    fn encode<C>(
        width: u32,
        height: u32,
        data: &[C::Inner],
        compression: TiffCompression,
        config: &ConversionConfig,
    ) -> Result<Vec<u8>>
    where
        C: ColorType,
        [C::Inner]: TiffValue,
    {
        let mut buffer = Vec::new();
        {
            let codec = match compression {
                TiffCompression::None => Compression::Uncompressed,
                TiffCompression::Lzw => Compression::Lzw,
                TiffCompression::Deflate => Compression::Deflate(DeflateLevel::Balanced),
            };

            let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
                .map_err(encode_error)?
                .with_compression(codec);

            // Differencing only pays off when something compresses the result.
            if compression != TiffCompression::None {
                if let Some(2) = config.predictor {
                    encoder = encoder.with_predictor(Predictor::Horizontal);
                }
            }

            let mut image = encoder
                .new_image::<C>(width, height)
                .map_err(encode_error)?;
            let dpi = Rational {
                n: config.resolution_dpi.max(1),
                d: 1,
            };
            image.resolution(ResolutionUnit::Inch, dpi);
            image
                .encoder()
                .write_tag(Tag::Orientation, ORIENTATION_TOP_LEFT)
                .map_err(encode_error)?;
            image
                .encoder()
                .write_tag(Tag::Software, SOFTWARE)
                .map_err(encode_error)?;
            image.write_data(data).map_err(encode_error)?;
        }
        Ok(buffer)
    }
}

impl TiffWriter for StandardTiffWriter {
    fn write_tiff(
        &self,
        image: &FinishedImage,
        output: &mut dyn Write,
        compression: TiffCompression,
        config: &ConversionConfig,
    ) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{} {}-bit, compression {}",
            image.width,
            image.height,
            image.bit_depth().bits(),
            compression.as_str()
        );
        if !image.is_consistent() {
            return Err(ConversionError::WriteFailure(format!(
                "{} samples do not fill a {}x{} RGB image",
                image.pixels.len(),
                image.width,
                image.height
            )));
        }

        let buffer = match &image.pixels {
            PixelData::Eight(data) => {
                Self::encode::<RGB8>(image.width, image.height, data, compression, config)?
            }
            PixelData::Sixteen(data) => {
                Self::encode::<RGB16>(image.width, image.height, data, compression, config)?
            }
        };

        output
            .write_all(&buffer)
            .map_err(|e| ConversionError::io("writing TIFF output", e))?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}
