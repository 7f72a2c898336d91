//! TIFF conversion configuration types

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression (good speed/size balance)
    Deflate,
}

impl TiffCompression {
    pub fn as_str(self) -> &'static str {
        match self {
            TiffCompression::None => "none",
            TiffCompression::Lzw => "lzw",
            TiffCompression::Deflate => "deflate",
        }
    }
}

/// How an extracted thumbnail is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailFormat {
    /// Embedded JPEG previews are copied verbatim; bitmap previews become TIFF.
    #[default]
    Native,
    /// Always decode the preview and write it as an 8-bit RGB TIFF.
    Tiff,
}

/// Default upper bound for either side of the sensor, in pixels.
pub const DEFAULT_MAX_DIMENSION: usize = 50_000;

/// Default upper bound for the sensor area, in pixels.
pub const DEFAULT_MAX_PIXELS: usize = 250_000_000;

/// Configuration for RAW to TIFF conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Predictor value for compression (typically 2 for horizontal differencing).
    /// Ignored for uncompressed output.
    pub predictor: Option<u16>,
    /// Declared sensor sides above this are rejected before allocation
    pub max_dimension: usize,
    /// Declared sensor areas above this are rejected before allocation
    pub max_pixels: usize,
    /// X/Y resolution written to the output, in dots per inch
    pub resolution_dpi: u32,
    /// Output encoding used by thumbnail conversion
    pub thumbnail_format: ThumbnailFormat,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            predictor: None,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_pixels: DEFAULT_MAX_PIXELS,
            resolution_dpi: 300,
            thumbnail_format: ThumbnailFormat::Native,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    predictor: Option<Option<u16>>,
    max_dimension: Option<usize>,
    max_pixels: Option<usize>,
    resolution_dpi: Option<u32>,
    thumbnail_format: Option<ThumbnailFormat>,
}

impl ConversionConfigBuilder {
    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn max_dimension(mut self, max: usize) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn max_pixels(mut self, max: usize) -> Self {
        self.max_pixels = Some(max);
        self
    }

    pub fn resolution_dpi(mut self, dpi: u32) -> Self {
        self.resolution_dpi = Some(dpi);
        self
    }

    pub fn thumbnail_format(mut self, format: ThumbnailFormat) -> Self {
        self.thumbnail_format = Some(format);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        ConversionConfig {
            predictor: self.predictor.unwrap_or(default.predictor),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
            max_pixels: self.max_pixels.unwrap_or(default.max_pixels),
            resolution_dpi: self.resolution_dpi.unwrap_or(default.resolution_dpi).max(1),
            thumbnail_format: self.thumbnail_format.unwrap_or(default.thumbnail_format),
        }
    }
}
