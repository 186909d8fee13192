//! Per-record stage errors.

use thiserror::Error;

use crate::codec::{CodecError, ImageFormat};

/// A stage failed for one record. Other records are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("unsupported image data: {0}")]
    UnsupportedFormat(String),

    #[error("encoding {format} failed: {reason}")]
    Encoding { format: ImageFormat, reason: String },

    #[error("image payload was never loaded")]
    MissingPayload,
}

impl From<CodecError> for StageError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Unsupported(reason) => Self::UnsupportedFormat(reason),
            CodecError::Encoding { format, reason } => Self::Encoding { format, reason },
        }
    }
}
