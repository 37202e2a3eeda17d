//! # neural_dream
//!
//! Score-distillation text-to-3D scene optimization with Burn.
//!
//! A dense implicit volume is rendered from random cameras into a 4-channel
//! latent image. A guidance component scores the render against a
//! view-dependent text embedding and returns a score-distillation loss whose
//! gradient pulls the volume toward the prompt. Auxiliary regularizers
//! (normal orientation, sparsity, opacity binarization and an optional
//! guide-shape prior) are added with step-scheduled weights.
//!
//! ## Features
//!
//! - **Registry**: components are built from string tags and JSON options
//! - **Lazy guidance**: the expensive guidance is built once, at fit start
//! - **Weight schedules**: constant or linearly ramped loss weights
//! - **Trainer**: RMSprop updates, validation orbits, filtered checkpoints
//! - **Exports**: image grids, orbit GIF and the extracted mesh
//!
//! ## Quick Start
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use neural_dream::prelude::*;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let experiment = ExperimentConfig::new();
//! let device = Default::default();
//!
//! let mut system = LatentNerfSystem::<MyBackend>::configure(
//!     experiment.system.clone(),
//!     Registry::with_builtins(),
//!     experiment.output_dir(),
//!     &device,
//! )?;
//! let mut trainer = Trainer::from_experiment(&experiment, &device)?;
//! trainer.fit(&mut system)?;
//! trainer.test(&mut system)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! dream_core (pure math: fields, isosurface, triangles)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//! dream_io          neural_dream
//! (images, GIF,     (components, system,
//!  OBJ, state dict)  trainer, CLI)
//!     │                  │
//!     └──────────────────┘
//!        checkpoints / exports
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod models;
pub mod registry;
pub mod system;
pub mod training;

// Re-export key types for convenience
pub use config::{ExperimentConfig, LossWeights, Progress, SystemConfig, TrainerConfig, WeightSchedule};
pub use error::{DreamError, Result};
pub use registry::Registry;
pub use system::{LatentNerfSystem, System};
pub use training::{TrainOutput, Trainer};

// Re-export from dream_core and dream_io for convenience
pub use dream_core::Point3;
pub use dream_io::{Mesh, StateDict};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        CameraConfig, ExperimentConfig, LossWeights, Progress, SystemConfig, TrainerConfig,
        WeightSchedule,
    };
    pub use crate::data::{orbit_cameras, Camera, CameraSampler, RayBatch};
    pub use crate::error::{DreamError, Result};
    pub use crate::loss::{opaque_loss, orientation_loss, sparsity_loss, ShapeLoss, ShapeLossConfig};
    pub use crate::models::{
        Background, DreamFusionPromptProcessor, Geometry, Guidance, GuidanceOutput, ImplicitVolume,
        ImplicitVolumeConfig, Material, NerfRendererConfig, NerfVolumeRenderer, Parameterized,
        PromptProcessor, PromptProcessorConfig, RenderOutput, Renderer, Scene,
        ScoreDistillationConfig, ScoreDistillationGuidance, TextEmbeddings, ViewDirection,
    };
    pub use crate::registry::Registry;
    pub use crate::system::{LatentNerfSystem, System};
    pub use crate::training::{
        checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint,
        CheckpointMetadata, OptimizerConfig, TrainOutput, Trainer,
    };

    pub use dream_core::Point3;
    pub use dream_io::{Mesh, StateDict};
}
