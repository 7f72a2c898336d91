//! Embedded preview extraction

mod extractor;
pub mod types;

pub use extractor::extract_thumbnail;
pub use types::{Thumbnail, ThumbnailKind};
