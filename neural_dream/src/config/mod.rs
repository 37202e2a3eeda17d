//! Configuration types for neural_dream.
//!
//! Burn-style configuration structs for the scene optimization system, the
//! camera sampler and the training driver, plus loss-weight schedules.

mod schedule;
mod system;
mod training;

pub use schedule::{LossWeights, Progress, WeightSchedule};
pub use system::SystemConfig;
pub use training::{CameraConfig, ExperimentConfig, TrainerConfig};
