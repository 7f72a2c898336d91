//! RAW decoding
//!
//! Identifies the container and camera, then unpacks the sensor mosaic of the
//! active area together with the metadata later stages need.

mod cameras;
pub(crate) mod container;
mod decoder;
mod rawloader_reader;
mod reader;
mod source;
mod strip_reader;
pub mod types;

pub use cameras::{
    camera_count, supported_cameras, Border, CameraEntry, SensorCfa, SensorLayout, CAMERA_TABLE,
};
pub use decoder::RawDecoder;
pub use rawloader_reader::RawLoaderReader;
pub use reader::RawImageReader;
pub use source::{raf_jpeg_location, ContainerKind, RawSource};
pub use strip_reader::StripReader;
pub use types::{
    BayerPattern, CameraId, CfaPattern, DecodeLimits, SensorMetadata, UnpackedImage,
};
