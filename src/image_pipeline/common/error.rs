use thiserror::Error;

use crate::image_pipeline::processing::Stage;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Invalid setting {token:?} at position {position}: {reason}")]
    InvalidSettings {
        position: usize,
        token: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt RAW file: {0}")]
    CorruptFile(String),

    #[error("IO failure ({context}): {source}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Processing failed in {stage} stage: {reason}")]
    ProcessingFailure { stage: Stage, reason: String },

    #[error("Failed to encode output image: {0}")]
    WriteFailure(String),

    #[error("No embedded thumbnail found")]
    NoEmbeddedThumbnail,
}

/// Fieldless mirror of [`ConversionError`] for callers that only need to
/// branch on the failure class (or hand a numeric code across an FFI edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSettings,
    UnsupportedFormat,
    CorruptFile,
    IoFailure,
    ProcessingFailure,
    WriteFailure,
    NoEmbeddedThumbnail,
}

impl ErrorKind {
    /// Stable numeric code. Never renumber existing kinds.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidSettings => 1,
            ErrorKind::UnsupportedFormat => 2,
            ErrorKind::CorruptFile => 3,
            ErrorKind::IoFailure => 4,
            ErrorKind::ProcessingFailure => 5,
            ErrorKind::WriteFailure => 6,
            ErrorKind::NoEmbeddedThumbnail => 7,
        }
    }
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::InvalidSettings { .. } => ErrorKind::InvalidSettings,
            ConversionError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ConversionError::CorruptFile(_) => ErrorKind::CorruptFile,
            ConversionError::IoFailure { .. } => ErrorKind::IoFailure,
            ConversionError::ProcessingFailure { .. } => ErrorKind::ProcessingFailure,
            ConversionError::WriteFailure(_) => ErrorKind::WriteFailure,
            ConversionError::NoEmbeddedThumbnail => ErrorKind::NoEmbeddedThumbnail,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConversionError::IoFailure {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_setting(position: usize, token: &str, reason: impl Into<String>) -> Self {
        ConversionError::InvalidSettings {
            position,
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub fn processing(stage: Stage, reason: impl Into<String>) -> Self {
        ConversionError::ProcessingFailure {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
