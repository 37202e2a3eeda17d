//! Error types for neural_dream.

use thiserror::Error;

/// Errors that can occur while configuring or training a scene.
#[derive(Error, Debug)]
pub enum DreamError {
    /// A render output channel required by an enabled loss term is missing.
    #[error("render output '{channel}' is required by {required_by} but the renderer did not produce it")]
    MissingRenderOutput {
        /// The missing channel.
        channel: &'static str,
        /// The loss term that needs it.
        required_by: &'static str,
    },

    /// The shape prior is weighted but no guide shape was configured.
    #[error("lambda_shape is positive but no guide_shape was configured")]
    ShapeLossNotConfigured,

    /// Guidance or prompt processor used before it was built.
    #[error("{component} used before setup; call on_fit_start or setup_guidance first")]
    GuidanceNotReady {
        /// The component that is not ready.
        component: &'static str,
    },

    /// No factory registered under a component tag.
    #[error("no {kind} registered under '{name}'")]
    UnknownComponent {
        /// Component kind (geometry, material, ...).
        kind: &'static str,
        /// The requested tag.
        name: String,
    },

    /// A component does not own a parameter with the given name.
    #[error("unknown parameter '{name}'")]
    UnknownParameter {
        /// The dotted parameter name.
        name: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Component options could not be deserialized.
    #[error("invalid options for {kind} '{name}': {source}")]
    InvalidOptions {
        /// Component kind.
        kind: &'static str,
        /// Component tag.
        name: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch for '{name}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Name of the tensor.
        name: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Training error.
    #[error("training error: {message}")]
    TrainingError {
        /// Description of the error.
        message: String,
    },

    /// I/O error from dream_io.
    #[error("I/O error: {0}")]
    IoError(#[from] dream_io::DreamIoError),

    /// Error from dream_core.
    #[error("geometry error: {0}")]
    CoreError(#[from] dream_core::DreamCoreError),

    /// JSON error while reading or writing metadata.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or corrupted data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<std::io::Error> for DreamError {
    fn from(err: std::io::Error) -> Self {
        DreamError::IoError(err.into())
    }
}

/// Result type for neural_dream operations.
pub type Result<T> = std::result::Result<T, DreamError>;
