//! Error types for dream_io operations.
//!
//! Provides specific error variants for mesh parsing, image export and
//! state-dict serialization failures.

use core::fmt;

/// Errors that can occur during dream_io operations.
#[derive(Debug, Clone, PartialEq)]
pub enum DreamIoError {
    /// Invalid file contents during deserialization or parsing.
    InvalidFormat {
        /// Description of the format error.
        message: String,
    },

    /// A tensor blob's data length does not match its shape.
    ShapeMismatch {
        /// Name of the offending entry.
        name: String,
        /// Number of values implied by the shape.
        expected: usize,
        /// Actual number of values.
        got: usize,
    },

    /// Images in a grid do not share the same height.
    HeightMismatch {
        /// Height of the first image in the grid.
        expected: usize,
        /// Height of the offending image.
        got: usize,
    },

    /// Image data has an unsupported channel count.
    UnsupportedChannels {
        /// Number of channels found.
        channels: usize,
    },

    /// Nothing to write (empty image grid or frame sequence).
    Empty {
        /// What was empty.
        what: &'static str,
    },

    /// Image encoding or decoding error.
    Image(String),

    /// I/O error during serialization/deserialization.
    Io(String),
}

impl DreamIoError {
    /// Shorthand for an [`DreamIoError::InvalidFormat`] error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        DreamIoError::InvalidFormat {
            message: message.into(),
        }
    }
}

impl fmt::Display for DreamIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DreamIoError::InvalidFormat { message } => {
                write!(f, "invalid file format: {}", message)
            }
            DreamIoError::ShapeMismatch {
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "tensor '{}' has {} values but its shape needs {}",
                    name, got, expected
                )
            }
            DreamIoError::HeightMismatch { expected, got } => {
                write!(
                    f,
                    "image height mismatch: expected {}, got {}",
                    expected, got
                )
            }
            DreamIoError::UnsupportedChannels { channels } => {
                write!(f, "unsupported channel count: {}", channels)
            }
            DreamIoError::Empty { what } => write!(f, "nothing to write: empty {}", what),
            DreamIoError::Image(msg) => write!(f, "image error: {}", msg),
            DreamIoError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DreamIoError {}

impl From<std::io::Error> for DreamIoError {
    fn from(err: std::io::Error) -> Self {
        DreamIoError::Io(err.to_string())
    }
}

impl From<image::ImageError> for DreamIoError {
    fn from(err: image::ImageError) -> Self {
        DreamIoError::Image(err.to_string())
    }
}

/// Result type alias for dream_io operations.
pub type Result<T> = core::result::Result<T, DreamIoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DreamIoError::HeightMismatch {
            expected: 64,
            got: 32,
        };
        assert_eq!(format!("{}", err), "image height mismatch: expected 64, got 32");

        let err = DreamIoError::ShapeMismatch {
            name: "geometry.grid".to_string(),
            expected: 8,
            got: 7,
        };
        assert!(format!("{}", err).contains("geometry.grid"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DreamIoError = io.into();
        assert!(matches!(err, DreamIoError::Io(_)));
    }
}
