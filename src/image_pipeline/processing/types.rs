//! Output image types

use crate::image_pipeline::settings::BitDepth;

/// Interleaved RGB samples at the output bit depth.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Eight(Vec<u8>),
    Sixteen(Vec<u16>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::Eight(v) => v.len(),
            PixelData::Sixteen(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            PixelData::Eight(_) => BitDepth::Eight,
            PixelData::Sixteen(_) => BitDepth::Sixteen,
        }
    }
}

/// Processed, oriented RGB image ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedImage {
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub pixels: PixelData,
}

impl FinishedImage {
    pub const CHANNELS: usize = 3;

    pub fn bit_depth(&self) -> BitDepth {
        self.pixels.bit_depth()
    }

    /// True when the buffer holds exactly width * height RGB samples.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * Self::CHANNELS
    }
}
