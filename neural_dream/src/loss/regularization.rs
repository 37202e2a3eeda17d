//! Regularizers on render outputs.

use burn::prelude::*;
use burn::tensor::activation::relu;

/// Clamp applied to probabilities before taking logs.
const BCE_EPS: f32 = 1e-7;

/// Orientation loss.
///
/// `L = Σ stopgrad(w) · relu(n · d)² / max(#{opacity > 0}, 1)`
///
/// Inputs:
/// - weights: [N, 1] - per-sample compositing weights
/// - normal: [N, 3] - per-sample normals
/// - t_dirs: [N, 3] - per-sample ray directions
/// - opacity: [B, H, W, 1] - accumulated opacity
///
/// Output: scalar loss
pub fn orientation_loss<B: Backend>(
    weights: Tensor<B, 2>,
    normal: Tensor<B, 2>,
    t_dirs: Tensor<B, 2>,
    opacity: Tensor<B, 4>,
) -> Tensor<B, 1> {
    let facing = relu((normal * t_dirs).sum_dim(1));
    let penalty = (weights.detach() * facing.powf_scalar(2.0)).sum();
    let covered = opacity.greater_elem(0.0).float().sum().clamp_min(1.0);
    penalty / covered
}

/// Sparsity loss, `mean(sqrt(opacity² + 0.01))`.
pub fn sparsity_loss<B: Backend>(opacity: Tensor<B, 4>) -> Tensor<B, 1> {
    (opacity.powf_scalar(2.0) + 0.01).sqrt().mean()
}

/// Opacity binarization loss.
///
/// Binary cross-entropy of the clamped opacity against itself, i.e. its
/// entropy, which is lowest at 0 and 1.
pub fn opaque_loss<B: Backend>(opacity: Tensor<B, 4>) -> Tensor<B, 1> {
    let clamped = opacity.clamp(1e-3, 1.0 - 1e-3);
    binary_cross_entropy(clamped.clone(), clamped)
}

/// Mean binary cross-entropy of probabilities `input` against `target`.
pub fn binary_cross_entropy<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    bce_terms(input, target).mean()
}

/// Weighted mean binary cross-entropy, `mean(weight · bce)`.
pub fn weighted_binary_cross_entropy<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
    weight: Tensor<B, D>,
) -> Tensor<B, 1> {
    (bce_terms(input, target) * weight).mean()
}

fn bce_terms<B: Backend, const D: usize>(input: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, D> {
    let p = input.clamp(BCE_EPS, 1.0 - BCE_EPS);
    let log_p = p.clone().log();
    let log_q = p.neg().add_scalar(1.0).log();
    (target.clone() * log_p + target.neg().add_scalar(1.0) * log_q).neg()
}
