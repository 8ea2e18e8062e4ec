use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for proposal generation.
///
/// Variants are split by who is at fault: the caller's configuration, the
/// filesystem, image decoding, or the frame source feeding the processing loop.
/// Zero-dimension frames are not an error at all; they produce an empty
/// proposal list.
#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: image::ImageError,
    },

    /// A single frame could not be read. The frame loop reports it and moves on.
    #[error("Frame {index} could not be decoded")]
    FrameDecode {
        index: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The frame source itself is broken. The frame loop stops after reporting it.
    #[error("Frame source error: {operation} failed")]
    FrameSource {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, ProposalError>;

impl ProposalError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the frame loop may continue with the next frame after this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameDecode { .. })
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should construct
/// `ProposalError::FileSystem` directly; this is the fallback for `?`.
impl From<std::io::Error> for ProposalError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for ProposalError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_frame_decode_is_recoverable() {
        let decode = ProposalError::FrameDecode {
            index: 3,
            source: "truncated".into(),
        };
        let source = ProposalError::FrameSource {
            operation: "read".to_string(),
            source: "gone".into(),
        };
        assert!(decode.is_recoverable());
        assert!(!source.is_recoverable());
        assert!(!ProposalError::configuration("bad").is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = ProposalError::validation("k", "must be non-negative");
        assert_eq!(err.to_string(), "Validation error: k must be non-negative");

        let err = ProposalError::FrameDecode {
            index: 7,
            source: "bad".into(),
        };
        assert_eq!(err.to_string(), "Frame 7 could not be decoded");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ProposalError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, ProposalError::FileSystem { .. }));
    }
}
