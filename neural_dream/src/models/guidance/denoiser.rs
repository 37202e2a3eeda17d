//! Noise predictors used by score distillation.

use burn::prelude::*;

use crate::data::Lcg;

/// Predicts the noise in a noisy latent image.
pub trait Denoiser<B: Backend> {
    /// Predict `ε` for `noisy = √ᾱ·x₀ + √(1-ᾱ)·ε`.
    ///
    /// `noisy` is `[B, H, W, C]`, `text` is `[B, D]`.
    fn predict_noise(&self, noisy: Tensor<B, 4>, alpha_bar: f32, text: Tensor<B, 2>) -> Tensor<B, 4>;

    /// Fixed tensors, for state dicts.
    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }
}

/// Exact denoiser for a data distribution concentrated at one latent colour.
///
/// The prior mean of a prompt is `μ = text · P` with a fixed random
/// projection `P` (`[D, C]`). Every pixel of the clean image is `μ`, so the
/// optimal prediction is `ε = (noisy - √ᾱ·μ) / √(1-ᾱ)`.
#[derive(Debug, Clone)]
pub struct PointPriorDenoiser<B: Backend> {
    projection: Tensor<B, 2>,
}

impl<B: Backend> PointPriorDenoiser<B> {
    /// Create a denoiser with a seeded Gaussian projection.
    pub fn new(embedding_dim: usize, latent_channels: usize, seed: u64, device: &B::Device) -> Self {
        let mut rng = Lcg::new(seed);
        let values: Vec<f32> = (0..embedding_dim * latent_channels)
            .map(|_| rng.gaussian())
            .collect();
        Self {
            projection: Tensor::from_data(
                TensorData::new(values, [embedding_dim, latent_channels]),
                device,
            ),
        }
    }

    /// Embedding width accepted by the projection.
    pub fn embedding_dim(&self) -> usize {
        self.projection.dims()[0]
    }

    /// Prior latent colour for each embedding row, `[B, C]`.
    pub fn prior_mean(&self, text: Tensor<B, 2>) -> Tensor<B, 2> {
        text.matmul(self.projection.clone())
    }
}

impl<B: Backend> Denoiser<B> for PointPriorDenoiser<B> {
    fn predict_noise(&self, noisy: Tensor<B, 4>, alpha_bar: f32, text: Tensor<B, 2>) -> Tensor<B, 4> {
        let [b, _, _, c] = noisy.dims();
        let mean = self.prior_mean(text).reshape([b, 1, 1, c]);
        (noisy - mean * alpha_bar.sqrt()) / (1.0 - alpha_bar).sqrt()
    }

    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        vec![("projection".to_string(), self.projection.clone())]
    }
}
