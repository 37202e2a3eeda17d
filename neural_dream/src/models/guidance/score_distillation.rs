//! Score distillation sampling.
//!
//! One guidance query:
//!
//! 1. encode pixel input to latents (unless already latent)
//! 2. draw a timestep `t` in `[min_step, max_step]` and Gaussian noise `ε`
//! 3. noise the detached latents, `x_t = √ᾱ_t·x + √(1-ᾱ_t)·ε`
//! 4. predict noise with classifier-free guidance,
//!    `ε̂ = ε̂_uncond + s·(ε̂_cond - ε̂_uncond)`
//! 5. `grad = (1 - ᾱ_t)·(ε̂ - ε)` with NaNs zeroed
//! 6. `sds = ½·Σ(x - stopgrad(x - grad))² / B`, whose gradient w.r.t. `x`
//!    is `grad / B`

use burn::config::Config;
use burn::prelude::*;
use burn::tensor::{Distribution, ElementConversion};

use crate::data::Lcg;
use crate::error::DreamError;
use crate::models::{frozen, Guidance, GuidanceOutput, Parameterized, TextEmbeddings};

use super::codec::{LatentCodec, LinearLatentCodec};
use super::denoiser::{Denoiser, PointPriorDenoiser};

/// Configuration for [`ScoreDistillationGuidance`].
#[derive(Config, Debug)]
pub struct ScoreDistillationConfig {
    /// Classifier-free guidance scale.
    #[config(default = 100.0)]
    pub guidance_scale: f32,

    /// Lower timestep bound as a fraction of `num_train_timesteps`.
    #[config(default = 0.02)]
    pub min_step_percent: f32,

    /// Upper timestep bound as a fraction of `num_train_timesteps`.
    #[config(default = 0.98)]
    pub max_step_percent: f32,

    /// Length of the diffusion schedule.
    #[config(default = 1000)]
    pub num_train_timesteps: usize,

    /// First beta of the scaled-linear schedule.
    #[config(default = 0.00085)]
    pub beta_start: f64,

    /// Last beta of the scaled-linear schedule.
    #[config(default = 0.012)]
    pub beta_end: f64,

    /// Width of the text embeddings fed to the built-in denoiser.
    #[config(default = 512)]
    pub embedding_dim: usize,

    /// Seed for timesteps and the built-in denoiser projection.
    #[config(default = 0)]
    pub seed: u64,
}

impl Default for ScoreDistillationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreDistillationConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.num_train_timesteps < 2 {
            return Err("num_train_timesteps must be at least 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_step_percent)
            || !(0.0..=1.0).contains(&self.max_step_percent)
            || self.min_step_percent > self.max_step_percent
        {
            return Err("need 0 <= min_step_percent <= max_step_percent <= 1".to_string());
        }
        if !(self.beta_start > 0.0 && self.beta_end >= self.beta_start && self.beta_end < 1.0) {
            return Err("need 0 < beta_start <= beta_end < 1".to_string());
        }
        if self.embedding_dim == 0 {
            return Err("embedding_dim must be positive".to_string());
        }
        Ok(())
    }
}

/// `ᾱ_t` of the scaled-linear DDPM schedule.
pub fn scaled_linear_alphas_cumprod(beta_start: f64, beta_end: f64, steps: usize) -> Vec<f32> {
    let (lo, hi) = (beta_start.sqrt(), beta_end.sqrt());
    let mut cumprod = 1.0f64;
    (0..steps)
        .map(|i| {
            let s = lo + (hi - lo) * i as f64 / (steps - 1) as f64;
            cumprod *= 1.0 - s * s;
            cumprod as f32
        })
        .collect()
}

/// Score distillation over a pluggable denoiser and latent codec.
pub struct ScoreDistillationGuidance<B: Backend> {
    config: ScoreDistillationConfig,
    alphas_cumprod: Vec<f32>,
    min_step: usize,
    max_step: usize,
    denoiser: Box<dyn Denoiser<B>>,
    codec: Box<dyn LatentCodec<B>>,
    rng: Lcg,
    device: B::Device,
}

impl<B: Backend> std::fmt::Debug for ScoreDistillationGuidance<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreDistillationGuidance")
            .field("config", &self.config)
            .field("min_step", &self.min_step)
            .field("max_step", &self.max_step)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> ScoreDistillationGuidance<B> {
    /// Guidance with the point-prior denoiser and the linear codec.
    pub fn new(config: ScoreDistillationConfig, device: &B::Device) -> crate::error::Result<Self> {
        let denoiser = PointPriorDenoiser::new(config.embedding_dim, 4, config.seed, device);
        let codec = LinearLatentCodec::new(device);
        Self::with_components(config, Box::new(denoiser), Box::new(codec), device)
    }

    /// Guidance with a custom denoiser and codec.
    pub fn with_components(
        config: ScoreDistillationConfig,
        denoiser: Box<dyn Denoiser<B>>,
        codec: Box<dyn LatentCodec<B>>,
        device: &B::Device,
    ) -> crate::error::Result<Self> {
        config
            .validate()
            .map_err(|message| DreamError::InvalidConfig { message })?;

        let steps = config.num_train_timesteps;
        let alphas_cumprod = scaled_linear_alphas_cumprod(config.beta_start, config.beta_end, steps);
        let min_step = (steps as f32 * config.min_step_percent).round() as usize;
        let max_step = ((steps as f32 * config.max_step_percent).round() as usize).min(steps - 1);

        log::info!(
            "Loaded score distillation guidance (scale {}, timesteps {}..={})",
            config.guidance_scale,
            min_step,
            max_step
        );

        Ok(Self {
            rng: Lcg::new(config.seed.wrapping_add(1)),
            config,
            alphas_cumprod,
            min_step,
            max_step,
            denoiser,
            codec,
            device: device.clone(),
        })
    }

    /// `ᾱ_t` for every timestep.
    pub fn alphas_cumprod(&self) -> &[f32] {
        &self.alphas_cumprod
    }

    /// Timestep bounds `(min_step, max_step)`.
    pub fn step_range(&self) -> (usize, usize) {
        (self.min_step, self.max_step)
    }

    /// Guidance configuration.
    pub fn config(&self) -> &ScoreDistillationConfig {
        &self.config
    }
}

impl<B: Backend> Parameterized<B> for ScoreDistillationGuidance<B> {
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }

    fn set_parameter(&mut self, name: &str, _value: Tensor<B, 2>) -> crate::error::Result<()> {
        Err(frozen(name))
    }

    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        let denoiser = self
            .denoiser
            .buffers()
            .into_iter()
            .map(|(name, t)| (format!("denoiser.{name}"), t));
        let codec = self
            .codec
            .buffers()
            .into_iter()
            .map(|(name, t)| (format!("codec.{name}"), t));
        denoiser.chain(codec).collect()
    }
}

impl<B: Backend> Guidance<B> for ScoreDistillationGuidance<B> {
    fn forward(
        &mut self,
        rgb: Tensor<B, 4>,
        text: &TextEmbeddings<B>,
        rgb_as_latents: bool,
    ) -> crate::error::Result<GuidanceOutput<B>> {
        let latents = if rgb_as_latents {
            rgb
        } else {
            self.codec.encode(rgb)
        };

        let dims = latents.dims();
        let [batch, _, _, channels] = dims;
        if channels != self.codec.latent_channels() {
            return Err(DreamError::ShapeMismatch {
                name: "latents".to_string(),
                expected: vec![batch, dims[1], dims[2], self.codec.latent_channels()],
                got: dims.to_vec(),
            });
        }
        let expected = [batch, self.config.embedding_dim];
        for (name, embedding) in [("cond", &text.cond), ("uncond", &text.uncond)] {
            if embedding.dims() != expected {
                return Err(DreamError::ShapeMismatch {
                    name: format!("{name} text embeddings"),
                    expected: expected.to_vec(),
                    got: embedding.dims().to_vec(),
                });
            }
        }

        let t = self.rng.range_inclusive(self.min_step, self.max_step);
        let alpha_bar = self.alphas_cumprod[t];

        let noise = Tensor::<B, 4>::random(dims, Distribution::Normal(0.0, 1.0), &self.device);
        let clean = latents.clone().detach();
        let noisy = clean.clone() * alpha_bar.sqrt() + noise.clone() * (1.0 - alpha_bar).sqrt();

        let eps_cond = self
            .denoiser
            .predict_noise(noisy.clone(), alpha_bar, text.cond.clone().detach());
        let eps_uncond = self
            .denoiser
            .predict_noise(noisy, alpha_bar, text.uncond.clone().detach());
        let eps = eps_uncond.clone() + (eps_cond - eps_uncond) * self.config.guidance_scale;

        let grad = (eps - noise) * (1.0 - alpha_bar);
        let grad = grad.clone().mask_fill(grad.is_nan(), 0.0).detach();
        let grad_norm: f32 = grad
            .clone()
            .powf_scalar(2.0)
            .sum()
            .sqrt()
            .into_scalar()
            .elem();

        let target = (clean - grad).detach();
        let sds = (latents - target).powf_scalar(2.0).sum() * (0.5 / batch as f32);

        Ok(GuidanceOutput {
            sds,
            grad_norm,
            timestep: t,
            min_step: self.min_step,
            max_step: self.max_step,
        })
    }

    fn decode_latents(&self, latents: Tensor<B, 4>) -> Tensor<B, 4> {
        self.codec.decode(latents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_vec_f32;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;
    type TrainBackend = Autodiff<NdArray>;

    fn embeddings<B: Backend>(dim: usize, device: &B::Device) -> TextEmbeddings<B> {
        let mut cond = vec![0.0f32; dim];
        cond[0] = 0.6;
        cond[1] = 0.8;
        TextEmbeddings {
            cond: Tensor::from_data(TensorData::new(cond, [1, dim]), device),
            uncond: Tensor::zeros([1, dim], device),
            views: vec![crate::models::ViewDirection::Front],
        }
    }

    fn small_config() -> ScoreDistillationConfig {
        ScoreDistillationConfig::new().with_embedding_dim(8).with_seed(3)
    }

    #[test]
    fn test_schedule_is_decreasing() {
        let alphas = scaled_linear_alphas_cumprod(0.00085, 0.012, 1000);
        assert_eq!(alphas.len(), 1000);
        assert!((alphas[0] - (1.0 - 0.00085)).abs() < 1e-6);
        assert!(alphas.windows(2).all(|w| w[1] < w[0]));
        assert!(alphas[999] > 0.0 && alphas[999] < 0.01);
    }

    #[test]
    fn test_step_range() {
        let guidance = ScoreDistillationGuidance::<TestBackend>::new(small_config(), &Default::default()).unwrap();
        assert_eq!(guidance.step_range(), (20, 980));
    }

    #[test]
    fn test_timestep_in_range() {
        let device = Default::default();
        let mut guidance = ScoreDistillationGuidance::<TestBackend>::new(small_config(), &device).unwrap();
        let text = embeddings::<TestBackend>(8, &device);
        for _ in 0..20 {
            let out = guidance
                .forward(Tensor::zeros([1, 2, 2, 4], &device), &text, true)
                .unwrap();
            assert!((out.min_step..=out.max_step).contains(&out.timestep));
            assert!(to_vec_f32(out.sds)[0].is_finite());
        }
    }

    #[test]
    fn test_gradient_pulls_toward_prior_mean() {
        let device = Default::default();
        let config = small_config().with_guidance_scale(1.0);
        let mut guidance = ScoreDistillationGuidance::<TrainBackend>::new(config.clone(), &device).unwrap();
        let text = embeddings::<TrainBackend>(8, &device);

        let latents = Tensor::<TrainBackend, 4>::zeros([1, 2, 2, 4], &device).require_grad();
        let out = guidance.forward(latents.clone(), &text, true).unwrap();
        let grads = out.sds.backward();
        let grad = to_vec_f32(latents.grad(&grads).unwrap());

        let prior = PointPriorDenoiser::<TrainBackend>::new(8, 4, config.seed, &device);
        let mean = to_vec_f32(prior.prior_mean(text.cond.clone()));

        // Descent direction -grad points at the prior mean in every pixel.
        for pixel in grad.chunks(4) {
            let dot: f32 = pixel.iter().zip(&mean).map(|(g, m)| g * m).sum();
            assert!(dot < 0.0);
        }
    }

    #[test]
    fn test_pixel_input_is_encoded() {
        let device = Default::default();
        let mut guidance = ScoreDistillationGuidance::<TestBackend>::new(small_config(), &device).unwrap();
        let text = embeddings::<TestBackend>(8, &device);
        let rgb = Tensor::full([1, 3, 3, 3], 0.5, &device);
        let out = guidance.forward(rgb.clone(), &text, false).unwrap();
        assert!(out.grad_norm.is_finite());

        // Pixel images are not valid latents.
        assert!(guidance.forward(rgb, &text, true).is_err());
    }

    struct NanDenoiser;

    impl<B: Backend> Denoiser<B> for NanDenoiser {
        fn predict_noise(&self, noisy: Tensor<B, 4>, _alpha_bar: f32, _text: Tensor<B, 2>) -> Tensor<B, 4> {
            noisy * f32::NAN
        }
    }

    #[test]
    fn test_nan_gradient_is_zeroed() {
        let device = Default::default();
        let mut guidance = ScoreDistillationGuidance::<TestBackend>::with_components(
            small_config(),
            Box::new(NanDenoiser),
            Box::new(LinearLatentCodec::new(&device)),
            &device,
        )
        .unwrap();
        let text = embeddings::<TestBackend>(8, &device);
        let out = guidance
            .forward(Tensor::ones([1, 2, 2, 4], &device), &text, true)
            .unwrap();
        assert_eq!(out.grad_norm, 0.0);
        assert_eq!(to_vec_f32(out.sds)[0], 0.0);
    }

    #[test]
    fn test_buffers_are_named() {
        let guidance = ScoreDistillationGuidance::<TestBackend>::new(small_config(), &Default::default()).unwrap();
        let names: Vec<String> = guidance.buffers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["denoiser.projection", "codec.decode_matrix", "codec.encode_matrix"]
        );
        assert!(guidance.parameters().is_empty());
    }
}
