//! Error types for dream_core operations.
//!
//! A plain enum with a hand-written `Display` so the crate stays no_std.

use core::fmt;

/// Errors that can occur while building or querying fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DreamCoreError {
    /// A field needs at least two samples per axis to form a cell.
    ResolutionTooSmall {
        /// The smallest axis resolution that was requested.
        resolution: usize,
    },
    /// The number of samples does not match the lattice resolution.
    SampleCountMismatch {
        /// Expected number of samples (product of the resolution).
        expected: usize,
        /// Actual number of samples provided.
        got: usize,
    },
    /// The bounding box is empty or inverted along some axis.
    DegenerateBounds,
}

impl fmt::Display for DreamCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DreamCoreError::ResolutionTooSmall { resolution } => {
                write!(f, "field resolution {} is below the minimum of 2", resolution)
            }
            DreamCoreError::SampleCountMismatch { expected, got } => {
                write!(f, "expected {} field samples, got {}", expected, got)
            }
            DreamCoreError::DegenerateBounds => write!(f, "field bounds are empty or inverted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DreamCoreError {}
