//! Integration tests for the regularization terms.

use burn::backend::NdArray;
use burn::prelude::*;

use neural_dream::loss::{binary_cross_entropy, opaque_loss, orientation_loss, sparsity_loss};

type TestBackend = NdArray;

fn opacity(value: f32) -> Tensor<TestBackend, 4> {
    Tensor::full([1, 2, 2, 1], value, &Default::default())
}

fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
    t.into_scalar()
}

#[test]
fn test_sparsity_lower_bound() {
    for value in [0.0, 0.2, 0.7, 1.0] {
        let loss = scalar(sparsity_loss(opacity(value)));
        assert!(loss >= 0.1 - 1e-6, "sparsity {} below 0.1 at opacity {}", loss, value);
    }
    // Minimized as opacity goes to zero.
    let at_zero = scalar(sparsity_loss(opacity(0.0)));
    assert!((at_zero - 0.1).abs() < 1e-6);
    assert!(scalar(sparsity_loss(opacity(0.3))) > at_zero);
}

#[test]
fn test_opaque_near_zero_at_extremes() {
    assert!(scalar(opaque_loss(opacity(0.0))) < 0.01);
    assert!(scalar(opaque_loss(opacity(1.0))) < 0.01);
    assert!(scalar(opaque_loss(opacity(0.4))) > 0.5);
}

#[test]
fn test_opaque_increases_toward_half() {
    let values: Vec<f32> = [0.05, 0.2, 0.35, 0.5]
        .into_iter()
        .map(|v| scalar(opaque_loss(opacity(v))))
        .collect();
    assert!(values.windows(2).all(|w| w[0] < w[1]), "not increasing: {:?}", values);
    // Entropy of a fair coin.
    assert!((values[3] - std::f32::consts::LN_2).abs() < 1e-4);

    let mirrored = scalar(opaque_loss(opacity(0.8)));
    assert!((mirrored - scalar(opaque_loss(opacity(0.2)))).abs() < 1e-5);
}

#[test]
fn test_bce_prefers_matching_target() {
    let device = Default::default();
    let target = Tensor::<TestBackend, 2>::from_data([[1.0f32], [0.0]], &device);
    let good = Tensor::<TestBackend, 2>::from_data([[0.9f32], [0.1]], &device);
    let bad = Tensor::<TestBackend, 2>::from_data([[0.1f32], [0.9]], &device);
    let good_loss = scalar(binary_cross_entropy(good, target.clone()));
    let bad_loss = scalar(binary_cross_entropy(bad, target));
    assert!(good_loss < bad_loss);
}

#[test]
fn test_orientation_penalizes_back_facing_normals() {
    let device = Default::default();
    let weights = Tensor::<TestBackend, 2>::ones([2, 1], &device);
    let dirs = Tensor::<TestBackend, 2>::from_data([[0.0f32, 0.0, -1.0], [0.0, 0.0, -1.0]], &device);
    let facing = Tensor::<TestBackend, 2>::from_data([[0.0f32, 0.0, 1.0], [0.0, 0.0, 1.0]], &device);
    let away = Tensor::<TestBackend, 2>::from_data([[0.0f32, 0.0, -1.0], [0.0, 0.0, -1.0]], &device);

    let visible = opacity(0.5);
    let front = scalar(orientation_loss(weights.clone(), facing, dirs.clone(), visible.clone()));
    let back = scalar(orientation_loss(weights, away, dirs, visible));
    assert!(front.abs() < 1e-6);
    // Two unit penalties over four visible pixels.
    assert!((back - 0.5).abs() < 1e-5);
}

#[test]
fn test_orientation_with_no_visible_pixels_is_finite() {
    let device = Default::default();
    let weights = Tensor::<TestBackend, 2>::ones([1, 1], &device);
    let dirs = Tensor::<TestBackend, 2>::from_data([[1.0f32, 0.0, 0.0]], &device);
    let normal = dirs.clone();
    let loss = scalar(orientation_loss(weights, normal, dirs, opacity(0.0)));
    assert!(loss.is_finite());
    assert!((loss - 1.0).abs() < 1e-6);
}
