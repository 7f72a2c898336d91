//! Picks the backend for a RAW file.

use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::cameras;
use crate::image_pipeline::raw::container::{TiffContainer, COMPRESSION_NONE};
use crate::image_pipeline::raw::rawloader_reader::RawLoaderReader;
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::source::{ContainerKind, RawSource};
use crate::image_pipeline::raw::strip_reader::{locate_raw_ifd, StripReader};
use crate::image_pipeline::raw::types::{DecodeLimits, UnpackedImage};

/// Default reader: uncompressed TIFF strips are unpacked in-crate, everything
/// else is handed to rawloader. Unknown cameras are refused either way.
pub struct RawDecoder {
    limits: DecodeLimits,
    strips: StripReader,
    rawloader: RawLoaderReader,
}

impl RawDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self {
            limits,
            strips: StripReader::new(limits),
            rawloader: RawLoaderReader::new(limits),
        }
    }
}

impl Default for RawDecoder {
    fn default() -> Self {
        Self::new(DecodeLimits::default())
    }
}

impl RawImageReader for RawDecoder {
    fn read_raw(&self, source: &RawSource) -> Result<UnpackedImage> {
        let camera = source.camera()?;
        let entry = cameras::require(camera)?;

        match source.container()? {
            ContainerKind::Tiff(_) => {
                let container = TiffContainer::parse(source.bytes())?;
                match locate_raw_ifd(&container)? {
                    Some(raw) if raw.compression == COMPRESSION_NONE => {
                        debug!("{}: uncompressed strips", camera);
                        self.strips.unpack(&container, &raw, entry, camera)
                    }
                    Some(raw) => {
                        self.limits.check(raw.width as usize, raw.height as usize)?;
                        debug!("{}: compression {}, using rawloader", camera, raw.compression);
                        self.rawloader.read_raw(source)
                    }
                    None => {
                        debug!("{}: no standard raw directory, using rawloader", camera);
                        self.rawloader.read_raw(source)
                    }
                }
            }
            ContainerKind::FujiRaf => self.rawloader.read_raw(source),
        }
    }

    fn set_limits(&mut self, limits: DecodeLimits) {
        self.limits = limits;
        self.strips.set_limits(limits);
        self.rawloader.set_limits(limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::error::ConversionError;
    use crate::image_pipeline::testing::RawFixture;

    fn decode(bytes: Vec<u8>) -> Result<UnpackedImage> {
        RawDecoder::default().read_raw(&RawSource::from_bytes(bytes))
    }

    #[test]
    fn test_uncompressed_goes_through_strips() {
        let image = decode(RawFixture::sony(8, 6).build()).unwrap();
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(image.metadata.camera.to_string(), "Sony ILCE-7M3");
    }

    #[test]
    fn test_unknown_camera_refused_before_decoding() {
        let err = decode(RawFixture::new("Hasselblad", "X2D 100C", 8, 6).build()).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_compressed_payload_checks_limits_first() {
        let bytes = RawFixture::sony(4, 4)
            .with_compression(7)
            .with_declared_size(4, 80_000)
            .build();
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, ConversionError::CorruptFile(_)));
    }

    #[test]
    fn test_jpeg_is_unsupported() {
        let err = decode(crate::image_pipeline::testing::jpeg_bytes(16, 8)).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
    }
}
