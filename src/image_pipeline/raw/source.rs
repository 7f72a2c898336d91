//! In-memory RAW file with lazily identified container and camera.

use std::cell::OnceCell;
use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::raw::container::{self, tags, ByteOrder, TiffContainer};
use crate::image_pipeline::raw::types::CameraId;

/// Fujifilm RAF magic, followed by format version and camera id.
pub const RAF_MAGIC: &[u8; 16] = b"FUJIFILMCCD-RAW ";
const RAF_MODEL_OFFSET: usize = 0x1C;
const RAF_MODEL_LEN: usize = 32;
const RAF_JPEG_OFFSET: usize = 0x54;
const RAF_JPEG_LENGTH: usize = 0x58;
/// Smallest header that still carries the preview pointers.
const RAF_HEADER_LEN: usize = 0x5C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Tiff(ByteOrder),
    FujiRaf,
}

#[derive(Debug, Clone)]
struct Identity {
    container: ContainerKind,
    camera: CameraId,
}

/// The bytes of one RAW file.
///
/// The whole file is read up front; container and camera are worked out on
/// first use and cached for the rest of the call.
#[derive(Debug)]
pub struct RawSource {
    bytes: Vec<u8>,
    identity: OnceCell<Identity>,
}

impl RawSource {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            identity: OnceCell::new(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| ConversionError::io(format!("reading {}", path.display()), e))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ConversionError::io("reading RAW input", e))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn container(&self) -> Result<ContainerKind> {
        Ok(self.identity()?.container)
    }

    pub fn camera(&self) -> Result<&CameraId> {
        Ok(&self.identity()?.camera)
    }

    fn identity(&self) -> Result<&Identity> {
        if let Some(identity) = self.identity.get() {
            return Ok(identity);
        }
        let identity = identify(&self.bytes)?;
        debug!(camera = %identity.camera, container = ?identity.container, "Identified RAW file");
        Ok(self.identity.get_or_init(|| identity))
    }
}

fn identify(bytes: &[u8]) -> Result<Identity> {
    if bytes.is_empty() {
        return Err(ConversionError::CorruptFile("file is empty".to_string()));
    }
    if bytes.starts_with(RAF_MAGIC) {
        return identify_raf(bytes);
    }
    let Some(order) = container::detect_byte_order(bytes) else {
        return Err(ConversionError::UnsupportedFormat(
            "unrecognised file signature".to_string(),
        ));
    };

    let parsed = TiffContainer::parse(bytes)?;
    let ifd0 = parsed
        .ifd0()
        .ok_or_else(|| ConversionError::CorruptFile("no IFD0".to_string()))?;
    let make = parsed.ascii(ifd0, tags::MAKE)?;
    let model = parsed.ascii(ifd0, tags::MODEL)?;
    match (make, model) {
        (Some(make), Some(model)) if !make.is_empty() && !model.is_empty() => Ok(Identity {
            container: ContainerKind::Tiff(order),
            camera: CameraId::new(&make, &model),
        }),
        _ => Err(ConversionError::UnsupportedFormat(
            "container does not name its camera".to_string(),
        )),
    }
}

fn identify_raf(bytes: &[u8]) -> Result<Identity> {
    if bytes.len() < RAF_HEADER_LEN {
        return Err(ConversionError::CorruptFile(format!(
            "RAF header truncated at {} bytes",
            bytes.len()
        )));
    }
    let raw_model = &bytes[RAF_MODEL_OFFSET..RAF_MODEL_OFFSET + RAF_MODEL_LEN];
    let model = String::from_utf8_lossy(raw_model);
    Ok(Identity {
        container: ContainerKind::FujiRaf,
        camera: CameraId::new("Fujifilm", &model),
    })
}

/// Offset and length of the JPEG preview declared in a RAF header.
pub fn raf_jpeg_location(bytes: &[u8]) -> Option<(usize, usize)> {
    if !bytes.starts_with(RAF_MAGIC) || bytes.len() < RAF_HEADER_LEN {
        return None;
    }
    let read = |at: usize| {
        u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
    };
    Some((read(RAF_JPEG_OFFSET), read(RAF_JPEG_LENGTH)))
}
