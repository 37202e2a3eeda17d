//! View-dependent prompting.
//!
//! Each camera gets a view suffix appended to the prompt, chosen from its
//! elevation and azimuth (degrees, azimuth 0 is the front):
//!
//! - `side`: default
//! - `front`: `abs(azimuth) < front_threshold`
//! - `back`: `abs(azimuth) > 180 - back_threshold`
//! - `overhead`: `elevation > overhead_threshold`
//!
//! Later entries win. Azimuths are wrapped to `[-180, 180)` first.

use burn::config::Config;
use burn::prelude::*;

use crate::data::RayBatch;
use crate::error::DreamError;
use crate::models::{frozen, Parameterized, PromptProcessor, TextEmbeddings};

use super::encoder::{HashingTextEncoder, TextEncoder};

/// Camera view used to pick a prompt suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDirection {
    /// Seen from the side.
    Side,
    /// Seen from the front.
    Front,
    /// Seen from behind.
    Back,
    /// Seen from above.
    Overhead,
}

impl ViewDirection {
    /// All views in embedding-table order.
    pub const ALL: [ViewDirection; 4] = [Self::Side, Self::Front, Self::Back, Self::Overhead];

    /// Prompt suffix, e.g. `"side view"`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Side => "side view",
            Self::Front => "front view",
            Self::Back => "back view",
            Self::Overhead => "overhead view",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Side => 0,
            Self::Front => 1,
            Self::Back => 2,
            Self::Overhead => 3,
        }
    }
}

/// Configuration for [`DreamFusionPromptProcessor`].
#[derive(Config, Debug)]
pub struct PromptProcessorConfig {
    /// Text prompt.
    #[config(default = "String::from(\"a hamburger\")")]
    pub prompt: String,

    /// Negative prompt, embedded as the unconditional branch.
    #[config(default = "String::new()")]
    pub negative_prompt: String,

    /// Append view suffixes to the prompt.
    #[config(default = true)]
    pub view_dependent_prompting: bool,

    /// Elevation above which a camera is overhead, in degrees.
    #[config(default = 60.0)]
    pub overhead_threshold: f32,

    /// Half-width of the front azimuth sector, in degrees.
    #[config(default = 45.0)]
    pub front_threshold: f32,

    /// Half-width of the back azimuth sector, in degrees.
    #[config(default = 45.0)]
    pub back_threshold: f32,

    /// Embedding width of the hashing encoder.
    #[config(default = 512)]
    pub embedding_dim: usize,
}

impl Default for PromptProcessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptProcessorConfig {
    /// View of a camera at the given angles.
    pub fn view_for(&self, elevation_deg: f32, azimuth_deg: f32) -> ViewDirection {
        let azimuth = (azimuth_deg + 180.0).rem_euclid(360.0) - 180.0;
        let mut view = ViewDirection::Side;
        if azimuth.abs() < self.front_threshold {
            view = ViewDirection::Front;
        }
        if azimuth.abs() > 180.0 - self.back_threshold {
            view = ViewDirection::Back;
        }
        if elevation_deg > self.overhead_threshold {
            view = ViewDirection::Overhead;
        }
        view
    }

    /// Full prompt for one view.
    pub fn view_prompt(&self, view: ViewDirection) -> String {
        if self.view_dependent_prompting {
            format!("{}, {}", self.prompt, view.suffix())
        } else {
            self.prompt.clone()
        }
    }
}

/// Prompt processor with embeddings precomputed for every view.
#[derive(Debug, Clone)]
pub struct DreamFusionPromptProcessor<B: Backend> {
    config: PromptProcessorConfig,
    /// Conditional embeddings, one row per [`ViewDirection::ALL`] entry.
    view_embeddings: Tensor<B, 2>,
    /// Negative prompt embedding, `[1, D]`.
    uncond_embedding: Tensor<B, 2>,
}

impl<B: Backend> DreamFusionPromptProcessor<B> {
    /// Build with the hashing encoder.
    pub fn new(config: PromptProcessorConfig, device: &B::Device) -> crate::error::Result<Self> {
        let encoder = HashingTextEncoder::new(config.embedding_dim);
        Self::with_encoder(config, &encoder, device)
    }

    /// Build with a custom encoder.
    pub fn with_encoder(
        config: PromptProcessorConfig,
        encoder: &dyn TextEncoder,
        device: &B::Device,
    ) -> crate::error::Result<Self> {
        if config.prompt.trim().is_empty() {
            return Err(DreamError::InvalidConfig {
                message: "prompt must not be empty".to_string(),
            });
        }
        let dim = encoder.dim();

        let mut rows = Vec::with_capacity(ViewDirection::ALL.len() * dim);
        for view in ViewDirection::ALL {
            let prompt = config.view_prompt(view);
            log::debug!("{:?} prompt: {}", view, prompt);
            rows.extend(encoder.encode(&prompt));
        }
        let uncond = encoder.encode(&config.negative_prompt);

        log::info!("Using prompt [{}] and negative prompt [{}]", config.prompt, config.negative_prompt);

        Ok(Self {
            view_embeddings: Tensor::from_data(
                TensorData::new(rows, [ViewDirection::ALL.len(), dim]),
                device,
            ),
            uncond_embedding: Tensor::from_data(TensorData::new(uncond, [1, dim]), device),
            config,
        })
    }

    /// Processor configuration.
    pub fn config(&self) -> &PromptProcessorConfig {
        &self.config
    }
}

impl<B: Backend> Parameterized<B> for DreamFusionPromptProcessor<B> {
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }

    fn set_parameter(&mut self, name: &str, _value: Tensor<B, 2>) -> crate::error::Result<()> {
        Err(frozen(name))
    }

    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        vec![
            ("view_embeddings".to_string(), self.view_embeddings.clone()),
            ("uncond_embedding".to_string(), self.uncond_embedding.clone()),
        ]
    }
}

impl<B: Backend> PromptProcessor<B> for DreamFusionPromptProcessor<B> {
    fn encode(&self, batch: &RayBatch<B>) -> crate::error::Result<TextEmbeddings<B>> {
        let n = batch.batch_size();
        if n == 0 || batch.azimuth.len() != n {
            return Err(DreamError::InvalidData(format!(
                "batch has {} elevations and {} azimuths",
                n,
                batch.azimuth.len()
            )));
        }

        let views: Vec<ViewDirection> = batch
            .elevation
            .iter()
            .zip(&batch.azimuth)
            .map(|(&ele, &azi)| self.config.view_for(ele, azi))
            .collect();
        let indices: Vec<i64> = views.iter().map(|v| v.index() as i64).collect();

        let device = self.view_embeddings.device();
        let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(indices, [n]), &device);

        Ok(TextEmbeddings {
            cond: self.view_embeddings.clone().select(0, indices),
            uncond: self.uncond_embedding.clone().repeat_dim(0, n),
            views,
        })
    }
}
