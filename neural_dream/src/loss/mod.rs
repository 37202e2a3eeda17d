//! Auxiliary loss terms for scene optimization.
//!
//! - Orientation: normals should not face away from the camera
//! - Sparsity: keep accumulated opacity small
//! - Opacity binarization: push opacity towards 0 or 1
//! - Shape prior: match NeRF occupancy to a guide mesh

mod regularization;
mod shape;

pub use regularization::{
    binary_cross_entropy, opaque_loss, orientation_loss, sparsity_loss,
    weighted_binary_cross_entropy,
};
pub use shape::{ShapeLoss, ShapeLossConfig};
