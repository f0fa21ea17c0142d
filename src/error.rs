//! Error types for lvface.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the lvface library.
#[derive(Error, Debug)]
pub enum Error {
    /// The model file is missing or malformed, or the requested execution
    /// backend could not be initialized.
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// An image could not be read or decoded. Read failures arrive as
    /// [`image::ImageError::IoError`].
    #[error("failed to decode image from {origin}")]
    ImageDecode {
        origin: String,
        #[source]
        source: image::ImageError,
    },

    /// A raw pixel buffer does not match its declared dimensions.
    #[error("invalid frame {width}x{height}: expected {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// An image URL could not be fetched (timeout, transport or HTTP status).
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// Two embeddings of different lengths were compared.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The inference session rejected the input or produced no usable output.
    #[error("model inference failed")]
    Inference(#[from] ort::Error),

    /// Configuration file could not be parsed or written.
    #[error("invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Embeddings could not be written out.
    #[error("failed to export embeddings to {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// This error followed by each of its causes, separated by `": "`.
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Result type alias for lvface operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_message_includes_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::ImageDecode {
            origin: "face.jpg".to_string(),
            source: image::ImageError::IoError(io),
        };

        assert_eq!(err.to_string(), "failed to decode image from face.jpg");
        assert_eq!(err.full_message(), "failed to decode image from face.jpg: no such file");
    }

    #[test]
    fn test_inference_keeps_ort_error() {
        let err = Error::from(ort::Error::new("model produced no outputs"));
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(
            err.full_message(),
            "model inference failed: model produced no outputs"
        );
    }
}
