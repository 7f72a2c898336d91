//! Image processing module
//!
//! Runs the fixed stage list (demosaic, white balance, colour transform,
//! highlight recovery, tone curve, geometry) over a single [`PipelineState`].

mod color;
mod demosaic;
mod geometry;
mod highlights;
mod pipeline;
mod state;
mod tone;
mod white_balance;
pub mod types;

pub(crate) use geometry::{apply_orientation, RgbImage};
pub use pipeline::{process, process_with_timings, StageFn, STAGES};
pub use state::{PipelineState, Plane, Stage, StageContext};
pub use types::{FinishedImage, PixelData};
