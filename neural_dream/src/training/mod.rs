//! Training infrastructure for scene optimization.
//!
//! This module provides:
//! - `Trainer`: fit/validate/test driver with checkpoint resume
//! - Per-parameter RMSprop state
//! - Training outputs and windowed metric logging
//! - Checkpoint save/load

mod checkpoint;
mod metrics;
mod optimizer;
mod trainer;

pub use checkpoint::{
    checkpoint_dir, checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint,
    CheckpointMetadata,
};
pub use metrics::{MetricsTracker, TrainOutput};
pub use optimizer::{OptimizerConfig, RmsPropState, SceneOptimizer};
pub use trainer::Trainer;
