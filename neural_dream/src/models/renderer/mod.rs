//! Volume renderers.

mod nerf;

pub use nerf::{NerfRendererConfig, NerfVolumeRenderer};
