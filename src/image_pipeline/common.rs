//! Common utilities module
//!
//! This module contains shared utilities used across the image pipeline.

pub mod error;
pub mod orientation;
pub mod publish;
pub mod timing;

pub use error::{ConversionError, ErrorKind, Result};
pub use orientation::Orientation;
pub use publish::publish_atomically;
pub use timing::{PipelineTimings, StepTiming, Timer};
