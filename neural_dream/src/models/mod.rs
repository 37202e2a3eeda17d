//! Scene, renderer, guidance and prompt components.
//!
//! Every component kind is a trait so the system can be assembled from
//! registry tags. The built-in implementations live in the submodules:
//!
//! - [`ImplicitVolume`]: dense density/feature grid
//! - [`NoMaterial`], [`SolidColorBackground`]: pass-through shading
//! - [`NerfVolumeRenderer`]: stratified volume rendering
//! - [`ScoreDistillationGuidance`]: SDS over a pluggable [`Denoiser`]
//! - [`DreamFusionPromptProcessor`]: view-dependent prompt embeddings

pub mod background;
pub mod geometry;
pub mod guidance;
pub mod material;
pub mod prompt;
pub mod renderer;

use burn::prelude::*;
use dream_io::Mesh;

use crate::data::RayBatch;
use crate::error::{DreamError, Result};

pub use background::{SolidColorBackground, SolidColorBackgroundConfig};
pub use geometry::{ImplicitVolume, ImplicitVolumeConfig, NormalType};
pub use guidance::{
    Denoiser, LatentCodec, LinearLatentCodec, PointPriorDenoiser, ScoreDistillationConfig,
    ScoreDistillationGuidance,
};
pub use material::{NoMaterial, NoMaterialConfig};
pub use prompt::{
    DreamFusionPromptProcessor, HashingTextEncoder, PromptProcessorConfig, TextEncoder,
    ViewDirection,
};
pub use renderer::{NerfRendererConfig, NerfVolumeRenderer};

/// Named 2D tensors owned by a component.
///
/// Names are relative to the component (`grid`, `color`); the system adds
/// the component prefix when building a state dict.
pub trait Parameterized<B: Backend> {
    /// Tensors updated by the optimizer.
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)>;

    /// Replace a parameter by name.
    fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> Result<()>;

    /// Fixed tensors that are saved but never optimized.
    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }
}

/// Check a replacement tensor against the current one.
pub(crate) fn check_shape<B: Backend>(
    name: &str,
    current: &Tensor<B, 2>,
    value: &Tensor<B, 2>,
) -> Result<()> {
    let (expected, got) = (current.dims(), value.dims());
    if expected != got {
        return Err(DreamError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

/// Output of a geometry query.
#[derive(Debug, Clone)]
pub struct GeometryOutput<B: Backend> {
    /// Activated density, `[N, 1]`.
    pub density: Tensor<B, 2>,
    /// Feature channels, `[N, F]`.
    pub features: Tensor<B, 2>,
    /// Unit outward normals, `[N, 3]`, when requested and supported.
    pub normal: Option<Tensor<B, 2>>,
}

/// A density field with per-point features.
pub trait Geometry<B: Backend>: Parameterized<B> {
    /// Number of feature channels returned per point.
    fn n_feature_dims(&self) -> usize;

    /// Whether `forward` can produce normals.
    fn supports_normal(&self) -> bool;

    /// Query density and features at `points` (`[N, 3]`).
    fn forward(&self, points: Tensor<B, 2>, output_normal: bool) -> GeometryOutput<B>;

    /// Extract an explicit surface.
    fn isosurface(&self) -> Result<Mesh>;
}

/// Maps geometry features to colour.
pub trait Material<B: Backend>: Parameterized<B> {
    /// Number of colour channels produced.
    fn n_output_dims(&self) -> usize;

    /// Shade features (`[N, F]`) seen along `view_dirs` (`[N, 3]`).
    fn forward(&self, features: Tensor<B, 2>, view_dirs: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Colour seen along rays that leave the scene.
pub trait Background<B: Backend>: Parameterized<B> {
    /// Number of colour channels produced.
    fn n_output_dims(&self) -> usize;

    /// Colour for each direction (`[N, 3]` in, `[N, C]` out).
    fn forward(&self, dirs: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// The optimizable scene: geometry, material and background.
pub struct Scene<B: Backend> {
    /// Density and features.
    pub geometry: Box<dyn Geometry<B>>,
    /// Feature shading.
    pub material: Box<dyn Material<B>>,
    /// Background colour.
    pub background: Box<dyn Background<B>>,
}

/// Component prefixes of scene parameters.
pub const SCENE_PREFIXES: [&str; 3] = ["geometry", "material", "background"];

fn prefixed<B: Backend>(
    groups: [Vec<(String, Tensor<B, 2>)>; 3],
) -> Vec<(String, Tensor<B, 2>)> {
    SCENE_PREFIXES
        .iter()
        .zip(groups)
        .flat_map(|(prefix, group)| {
            group
                .into_iter()
                .map(move |(name, t)| (format!("{prefix}.{name}"), t))
        })
        .collect()
}

impl<B: Backend> Scene<B> {
    /// Trainable tensors with dotted names (`geometry.grid`, ...).
    pub fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        prefixed([
            self.geometry.parameters(),
            self.material.parameters(),
            self.background.parameters(),
        ])
    }

    /// Fixed tensors with dotted names.
    pub fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        prefixed([
            self.geometry.buffers(),
            self.material.buffers(),
            self.background.buffers(),
        ])
    }

    /// Replace a parameter by dotted name.
    pub fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> Result<()> {
        let unknown = || DreamError::UnknownParameter {
            name: name.to_string(),
        };
        let (prefix, rest) = name.split_once('.').ok_or_else(unknown)?;
        match prefix {
            "geometry" => self.geometry.set_parameter(rest, value),
            "material" => self.material.set_parameter(rest, value),
            "background" => self.background.set_parameter(rest, value),
            _ => Err(unknown()),
        }
    }

    /// Number of trainable values.
    pub fn num_params(&self) -> usize {
        self.parameters()
            .iter()
            .map(|(_, t)| t.dims().iter().product::<usize>())
            .sum()
    }
}

/// Named outputs of a render pass.
///
/// `comp_rgb` and `opacity` are always present. Per-sample channels are
/// flattened over rays and samples (`N = rays * samples`).
#[derive(Debug, Clone)]
pub struct RenderOutput<B: Backend> {
    /// Composited colour (latent or pixel space), `[B, H, W, C]`.
    pub comp_rgb: Tensor<B, 4>,
    /// Accumulated opacity, `[B, H, W, 1]`.
    pub opacity: Tensor<B, 4>,
    /// Per-sample compositing weights, `[N, 1]`.
    pub weights: Option<Tensor<B, 2>>,
    /// Per-sample unit ray directions, `[N, 3]`.
    pub t_dirs: Option<Tensor<B, 2>>,
    /// Per-sample normals, `[N, 3]`.
    pub normal: Option<Tensor<B, 2>>,
    /// Composited normals mapped to `[0, 1]`, `[B, H, W, 3]`.
    pub comp_normal: Option<Tensor<B, 4>>,
    /// Sample positions, `[N, 3]`.
    pub points: Option<Tensor<B, 2>>,
    /// Sample densities, `[N, 1]`.
    pub density: Option<Tensor<B, 2>>,
    /// Displayable RGB, `[B, H, W, 3]`, added when decoding is requested.
    pub decoded_rgb: Option<Tensor<B, 4>>,
}

impl<B: Backend> RenderOutput<B> {
    /// Output with only the always-present channels.
    pub fn new(comp_rgb: Tensor<B, 4>, opacity: Tensor<B, 4>) -> Self {
        Self {
            comp_rgb,
            opacity,
            weights: None,
            t_dirs: None,
            normal: None,
            comp_normal: None,
            points: None,
            density: None,
            decoded_rgb: None,
        }
    }

    /// Number of per-sample entries (0 when no samples were produced).
    pub fn num_samples(&self) -> usize {
        self.points.as_ref().map(|p| p.dims()[0]).unwrap_or(0)
    }
}

/// Renders a scene along a batch of rays.
pub trait Renderer<B: Backend> {
    /// Render `batch`. `training` enables stochastic sampling.
    fn render(&self, scene: &Scene<B>, batch: &RayBatch<B>, training: bool)
        -> Result<RenderOutput<B>>;
}

/// Per-item text conditioning.
#[derive(Debug, Clone)]
pub struct TextEmbeddings<B: Backend> {
    /// Conditional embeddings, `[B, D]`.
    pub cond: Tensor<B, 2>,
    /// Unconditional (negative prompt) embeddings, `[B, D]`.
    pub uncond: Tensor<B, 2>,
    /// View chosen for each batch item.
    pub views: Vec<ViewDirection>,
}

/// Result of one guidance query.
#[derive(Debug, Clone)]
pub struct GuidanceOutput<B: Backend> {
    /// Distillation loss whose gradient is the SDS update, `[1]`.
    pub sds: Tensor<B, 1>,
    /// Norm of the SDS gradient.
    pub grad_norm: f32,
    /// Diffusion timestep used.
    pub timestep: usize,
    /// Lower timestep bound.
    pub min_step: usize,
    /// Upper timestep bound.
    pub max_step: usize,
}

/// Diffusion guidance: distillation loss plus latent decoding.
pub trait Guidance<B: Backend>: Parameterized<B> {
    /// Compute the distillation loss for rendered colour `rgb` (`[B, H, W, C]`).
    ///
    /// With `rgb_as_latents` the input is already in latent space; otherwise
    /// it is pixel RGB in `[0, 1]` and is encoded first.
    fn forward(
        &mut self,
        rgb: Tensor<B, 4>,
        text: &TextEmbeddings<B>,
        rgb_as_latents: bool,
    ) -> Result<GuidanceOutput<B>>;

    /// Map latents (`[B, H, W, 4]`) to displayable RGB (`[B, H, W, 3]`).
    fn decode_latents(&self, latents: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Turns a batch's camera angles into text embeddings.
pub trait PromptProcessor<B: Backend>: Parameterized<B> {
    /// Embeddings for every item of `batch`.
    fn encode(&self, batch: &RayBatch<B>) -> Result<TextEmbeddings<B>>;
}

/// Parameters of a frozen component are never replaced.
pub(crate) fn frozen(name: &str) -> DreamError {
    DreamError::UnknownParameter {
        name: name.to_string(),
    }
}

/// Copy a tensor's values to the host as `f32`.
pub(crate) fn to_vec_f32<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}
