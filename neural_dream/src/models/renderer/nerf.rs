//! Stratified NeRF-style volume rendering.
//!
//! Each ray is sampled at `S` depths between `near` and `far`. Sample colour
//! and density come from the scene; compositing uses
//!
//! ```text
//! alpha_i   = 1 - exp(-sigma_i * delta)
//! T_i       = exp(-sum_{j<i} sigma_j * delta)
//! w_i       = alpha_i * T_i
//! rgb       = sum_i w_i * c_i + (1 - sum_i w_i) * background
//! ```
//!
//! The exclusive prefix sum is a matmul with a strictly upper-triangular
//! matrix so it stays differentiable on every backend.

use burn::config::Config;
use burn::prelude::*;
use burn::tensor::Distribution;

use crate::data::RayBatch;
use crate::error::DreamError;
use crate::models::{RenderOutput, Renderer, Scene};

/// Configuration for [`NerfVolumeRenderer`].
#[derive(Config, Debug)]
pub struct NerfRendererConfig {
    /// Samples per ray.
    #[config(default = 64)]
    pub num_samples_per_ray: usize,

    /// Distance of the first sample from the ray origin.
    #[config(default = 0.1)]
    pub near: f32,

    /// Distance of the last sample from the ray origin.
    #[config(default = 3.0)]
    pub far: f32,

    /// Jitter sample depths within their strata while training.
    #[config(default = true)]
    pub stratified: bool,
}

impl Default for NerfRendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Volume renderer with uniform stratified sampling.
#[derive(Debug, Clone)]
pub struct NerfVolumeRenderer {
    config: NerfRendererConfig,
}

impl NerfVolumeRenderer {
    /// Create the renderer.
    pub fn new(config: NerfRendererConfig) -> crate::error::Result<Self> {
        if config.num_samples_per_ray == 0 {
            return Err(DreamError::InvalidConfig {
                message: "num_samples_per_ray must be positive".to_string(),
            });
        }
        if !(config.near >= 0.0 && config.far > config.near) {
            return Err(DreamError::InvalidConfig {
                message: format!("need 0 <= near < far, got {} and {}", config.near, config.far),
            });
        }
        Ok(Self { config })
    }

    /// Renderer configuration.
    pub fn config(&self) -> &NerfRendererConfig {
        &self.config
    }

    /// Sample depths, `[rays, samples]`.
    fn sample_depths<B: Backend>(&self, n_rays: usize, training: bool, device: &B::Device) -> Tensor<B, 2> {
        let s = self.config.num_samples_per_ray;
        let strata = Tensor::<B, 1, Int>::arange(0..s as i64, device)
            .float()
            .reshape([1, s])
            .repeat_dim(0, n_rays);
        let offset = if training && self.config.stratified {
            Tensor::random([n_rays, s], Distribution::Uniform(0.0, 1.0), device)
        } else {
            Tensor::full([n_rays, s], 0.5, device)
        };
        let span = self.config.far - self.config.near;
        (strata + offset) * (span / s as f32) + self.config.near
    }
}

/// `[n, n]` matrix with ones strictly above the diagonal.
fn exclusive_prefix_matrix<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..n * n)
        .map(|k| if k / n < k % n { 1.0 } else { 0.0 })
        .collect();
    Tensor::from_data(TensorData::new(values, [n, n]), device)
}

impl<B: Backend> Renderer<B> for NerfVolumeRenderer {
    fn render(&self, scene: &Scene<B>, batch: &RayBatch<B>, training: bool) -> crate::error::Result<RenderOutput<B>> {
        let device = batch.rays_o.device();
        let (b, h, w) = (batch.batch_size(), batch.height, batch.width);
        let n_rays = batch.num_rays();
        let s = self.config.num_samples_per_ray;
        let n_samples = n_rays * s;
        let delta = (self.config.far - self.config.near) / s as f32;

        let origins = batch.flat_origins();
        let dirs = batch.flat_directions();
        let t = self.sample_depths::<B>(n_rays, training, &device);

        let points = (origins.reshape([n_rays, 1, 3])
            + dirs.clone().reshape([n_rays, 1, 3]) * t.reshape([n_rays, s, 1]))
        .reshape([n_samples, 3]);
        let t_dirs = dirs
            .clone()
            .reshape([n_rays, 1, 3])
            .repeat_dim(1, s)
            .reshape([n_samples, 3]);

        let geo = scene
            .geometry
            .forward(points.clone(), scene.geometry.supports_normal());
        let color = scene.material.forward(geo.features, t_dirs.clone());
        let bg = scene.background.forward(dirs);

        let channels = color.dims()[1];
        if bg.dims()[1] != channels {
            return Err(DreamError::InvalidConfig {
                message: format!(
                    "material produces {} channels but background produces {}",
                    channels,
                    bg.dims()[1]
                ),
            });
        }

        let sigma_delta = geo.density.clone().reshape([n_rays, s]) * delta;
        let alpha = sigma_delta.clone().neg().exp().neg() + 1.0;
        let transmittance = sigma_delta
            .matmul(exclusive_prefix_matrix::<B>(s, &device))
            .neg()
            .exp();
        let weights = alpha * transmittance;

        let opacity = weights.clone().sum_dim(1);
        let weights_3d = weights.clone().reshape([n_rays, s, 1]);
        let comp: Tensor<B, 2> = (weights_3d.clone() * color.reshape([n_rays, s, channels]))
            .sum_dim(1)
            .squeeze(1);
        let comp_rgb = comp + bg * (opacity.clone().neg() + 1.0);

        let comp_normal = geo.normal.as_ref().map(|normal| {
            let comp_n: Tensor<B, 2> = (weights_3d * normal.clone().reshape([n_rays, s, 3]))
                .sum_dim(1)
                .squeeze(1);
            let mapped = (comp_n + 1.0) * 0.5 * opacity.clone() + (opacity.clone().neg() + 1.0);
            mapped.reshape([b, h, w, 3])
        });

        let mut out = RenderOutput::new(
            comp_rgb.reshape([b, h, w, channels]),
            opacity.reshape([b, h, w, 1]),
        );
        out.weights = Some(weights.reshape([n_samples, 1]));
        out.t_dirs = Some(t_dirs);
        out.normal = geo.normal;
        out.comp_normal = comp_normal;
        out.points = Some(points);
        out.density = Some(geo.density);
        Ok(out)
    }
}
