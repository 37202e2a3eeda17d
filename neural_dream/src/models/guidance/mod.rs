//! Diffusion guidance.

mod codec;
mod denoiser;
mod score_distillation;

pub use codec::{LatentCodec, LinearLatentCodec, LATENT_RGB_FACTORS};
pub use denoiser::{Denoiser, PointPriorDenoiser};
pub use score_distillation::{
    scaled_linear_alphas_cumprod, ScoreDistillationConfig, ScoreDistillationGuidance,
};
