//! Dense voxel grid of density and features.
//!
//! The grid stores `R³` rows of `[raw_density, feature_0, .., feature_F-1]`
//! over the cube `[-radius, radius]³`, row index `ix + R * (iy + R * iz)`.
//! Queries interpolate trilinearly; the eight corner stencils are computed on
//! the host and the corner rows are gathered with `select`, so gradients flow
//! back into the grid through ordinary autodiff.
//!
//! Density is `softplus(raw + bias)` where the blob bias
//! `scale * (1 - |p| / std)` seeds an initial blob at the origin. Points
//! outside the cube have zero density and zero features.

use burn::config::Config;
use burn::prelude::*;
use burn::tensor::activation::relu;
use dream_core::{extract_isosurface, DenseField, Inside, Point3};
use dream_io::Mesh;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DreamError;
use crate::models::{check_shape, to_vec_f32, Geometry, GeometryOutput, Parameterized};

/// How normals are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalType {
    /// Negative normalized gradient of the pre-activation density.
    Analytic,
    /// No normals.
    None,
}

/// Configuration for [`ImplicitVolume`].
#[derive(Config, Debug)]
pub struct ImplicitVolumeConfig {
    /// Half-size of the bounding cube.
    #[config(default = 1.0)]
    pub radius: f32,

    /// Lattice points per axis.
    #[config(default = 32)]
    pub grid_resolution: usize,

    /// Feature channels per point (4 for latent-space rendering).
    #[config(default = 4)]
    pub n_feature_dims: usize,

    /// Peak of the initial density blob.
    #[config(default = 10.0)]
    pub density_blob_scale: f32,

    /// Radius at which the blob bias crosses zero.
    #[config(default = 0.5)]
    pub density_blob_std: f32,

    /// Normal estimation.
    #[config(default = "NormalType::Analytic")]
    pub normal_type: NormalType,

    /// Density level of the exported surface.
    #[config(default = 25.0)]
    pub isosurface_threshold: f32,

    /// Lattice points per axis for surface extraction.
    #[config(default = 64)]
    pub isosurface_resolution: usize,
}

impl Default for ImplicitVolumeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ImplicitVolumeConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.radius <= 0.0 {
            return Err("radius must be positive".to_string());
        }
        if self.grid_resolution < 2 || self.isosurface_resolution < 2 {
            return Err("resolutions must be at least 2".to_string());
        }
        if self.density_blob_std <= 0.0 {
            return Err("density_blob_std must be positive".to_string());
        }
        Ok(())
    }

    /// Number of grid rows.
    pub fn num_cells(&self) -> usize {
        self.grid_resolution * self.grid_resolution * self.grid_resolution
    }
}

/// Trilinear stencil of one query point.
struct Stencil {
    rows: [i64; 8],
    weights: [f32; 8],
    /// Spatial derivative of each corner weight.
    weight_grads: [[f32; 3]; 8],
    inside: bool,
    bias: f32,
    bias_grad: [f32; 3],
}

/// Grid geometry needed to build stencils on worker threads.
#[derive(Debug, Clone, Copy)]
struct Lattice {
    resolution: usize,
    radius: f32,
    blob_scale: f32,
    blob_std: f32,
}

impl Lattice {
    fn blob_bias(&self, p: Point3) -> (f32, [f32; 3]) {
        let r = p.length();
        let bias = self.blob_scale * (1.0 - r / self.blob_std);
        let grad = if r > 0.0 {
            (p * (-self.blob_scale / (self.blob_std * r))).as_array()
        } else {
            [0.0; 3]
        };
        (bias, grad)
    }

    fn stencil(&self, p: Point3) -> Stencil {
        let res = self.resolution;
        let cells = (res - 1) as f32;
        let to_grid = cells / (2.0 * self.radius);
        let (bias, bias_grad) = self.blob_bias(p);

        let g = (p + Point3::splat(self.radius)) * to_grid;
        let inside = [g.x, g.y, g.z].iter().all(|&c| (0.0..=cells).contains(&c));
        if !inside {
            return Stencil {
                rows: [0; 8],
                weights: [0.0; 8],
                weight_grads: [[0.0; 3]; 8],
                inside: false,
                bias,
                bias_grad,
            };
        }

        let base = [g.x, g.y, g.z].map(|c| (c.floor() as usize).min(res - 2));
        let frac = [
            g.x - base[0] as f32,
            g.y - base[1] as f32,
            g.z - base[2] as f32,
        ];

        let mut rows = [0i64; 8];
        let mut weights = [0f32; 8];
        let mut weight_grads = [[0f32; 3]; 8];
        for corner in 0..8 {
            let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let mut axis_w = [0f32; 3];
            let mut axis_dw = [0f32; 3];
            for a in 0..3 {
                if offset[a] == 1 {
                    axis_w[a] = frac[a];
                    axis_dw[a] = to_grid;
                } else {
                    axis_w[a] = 1.0 - frac[a];
                    axis_dw[a] = -to_grid;
                }
            }
            let [ix, iy, iz] = [base[0] + offset[0], base[1] + offset[1], base[2] + offset[2]];
            rows[corner] = (ix + res * (iy + res * iz)) as i64;
            weights[corner] = axis_w[0] * axis_w[1] * axis_w[2];
            weight_grads[corner] = [
                axis_dw[0] * axis_w[1] * axis_w[2],
                axis_w[0] * axis_dw[1] * axis_w[2],
                axis_w[0] * axis_w[1] * axis_dw[2],
            ];
        }

        Stencil {
            rows,
            weights,
            weight_grads,
            inside: true,
            bias,
            bias_grad,
        }
    }
}

/// Dense density/feature grid.
#[derive(Debug)]
pub struct ImplicitVolume<B: Backend> {
    /// Grid values, `[R³, 1 + F]`.
    pub grid: Tensor<B, 2>,
    config: ImplicitVolumeConfig,
    device: B::Device,
}

impl<B: Backend> ImplicitVolume<B> {
    /// Create a grid with zero raw density and zero features.
    pub fn new(config: ImplicitVolumeConfig, device: &B::Device) -> crate::error::Result<Self> {
        config
            .validate()
            .map_err(|message| DreamError::InvalidConfig { message })?;
        let grid = Tensor::zeros([config.num_cells(), 1 + config.n_feature_dims], device).require_grad();
        Ok(Self {
            grid,
            config,
            device: device.clone(),
        })
    }

    /// Grid configuration.
    pub fn config(&self) -> &ImplicitVolumeConfig {
        &self.config
    }

    fn lattice(&self) -> Lattice {
        Lattice {
            resolution: self.config.grid_resolution,
            radius: self.config.radius,
            blob_scale: self.config.density_blob_scale,
            blob_std: self.config.density_blob_std,
        }
    }

    /// Density only, for surface extraction.
    fn density_at(&self, points: &[Point3]) -> Vec<f32> {
        let flat: Vec<f32> = points.iter().flat_map(|p| p.as_array()).collect();
        let tensor = Tensor::<B, 2>::from_data(TensorData::new(flat, [points.len(), 3]), &self.device);
        to_vec_f32(self.forward(tensor, false).density)
    }
}

/// Numerically stable `ln(1 + e^x)`.
fn softplus<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    relu(x.clone()) + x.abs().neg().exp().log1p()
}

impl<B: Backend> Parameterized<B> for ImplicitVolume<B> {
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        vec![("grid".to_string(), self.grid.clone())]
    }

    fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> crate::error::Result<()> {
        match name {
            "grid" => {
                check_shape(name, &self.grid, &value)?;
                self.grid = value;
                Ok(())
            }
            _ => Err(DreamError::UnknownParameter {
                name: name.to_string(),
            }),
        }
    }
}

impl<B: Backend> Geometry<B> for ImplicitVolume<B> {
    fn n_feature_dims(&self) -> usize {
        self.config.n_feature_dims
    }

    fn supports_normal(&self) -> bool {
        self.config.normal_type == NormalType::Analytic
    }

    fn forward(&self, points: Tensor<B, 2>, output_normal: bool) -> GeometryOutput<B> {
        let [n, _] = points.dims();
        let channels = 1 + self.config.n_feature_dims;
        let coords = to_vec_f32(points);

        let lattice = self.lattice();
        let stencils: Vec<Stencil> = coords
            .par_chunks(3)
            .map(|c| lattice.stencil(Point3::new(c[0], c[1], c[2])))
            .collect();

        let rows: Vec<i64> = stencils.iter().flat_map(|s| s.rows).collect();
        let weights: Vec<f32> = stencils.iter().flat_map(|s| s.weights).collect();
        let inside: Vec<f32> = stencils
            .iter()
            .map(|s| if s.inside { 1.0 } else { 0.0 })
            .collect();
        let bias: Vec<f32> = stencils.iter().map(|s| s.bias).collect();

        let device = &self.device;
        let rows = Tensor::<B, 1, Int>::from_data(TensorData::new(rows, [n * 8]), device);
        let weights = Tensor::<B, 3>::from_data(TensorData::new(weights, [n, 8, 1]), device);
        let inside = Tensor::<B, 2>::from_data(TensorData::new(inside, [n, 1]), device);
        let bias = Tensor::<B, 2>::from_data(TensorData::new(bias, [n, 1]), device);

        // Corner rows: [n, 8, channels]
        let corners = self.grid.clone().select(0, rows).reshape([n, 8, channels]);
        let values: Tensor<B, 2> = (corners.clone() * weights).sum_dim(1).squeeze(1);

        let raw = values.clone().slice([0..n, 0..1]);
        let density = softplus(raw + bias) * inside.clone();
        let features = values.slice([0..n, 1..channels]) * inside.clone();

        let normal = (output_normal && self.supports_normal()).then(|| {
            let weight_grads: Vec<f32> = stencils
                .iter()
                .flat_map(|s| s.weight_grads.into_iter().flatten())
                .collect();
            let bias_grad: Vec<f32> = stencils.iter().flat_map(|s| s.bias_grad).collect();
            let weight_grads =
                Tensor::<B, 3>::from_data(TensorData::new(weight_grads, [n, 8, 3]), device);
            let bias_grad = Tensor::<B, 2>::from_data(TensorData::new(bias_grad, [n, 3]), device);

            let raw_corners = corners.slice([0..n, 0..8, 0..1]);
            let raw_grad: Tensor<B, 2> = (raw_corners * weight_grads).sum_dim(1).squeeze(1);
            let grad = raw_grad * inside + bias_grad;
            let norm = grad.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-8);
            (grad / norm).neg()
        });

        GeometryOutput {
            density,
            features,
            normal,
        }
    }

    fn isosurface(&self) -> crate::error::Result<Mesh> {
        let res = self.config.isosurface_resolution;
        let radius = self.config.radius;
        let min = Point3::splat(-radius);
        let max = Point3::splat(radius);
        let step = 2.0 * radius / (res - 1) as f32;

        let mut positions = Vec::with_capacity(res * res * res);
        for iz in 0..res {
            for iy in 0..res {
                for ix in 0..res {
                    positions.push(min + Point3::new(ix as f32, iy as f32, iz as f32) * step);
                }
            }
        }

        let mut values = Vec::with_capacity(positions.len());
        for chunk in positions.chunks(1 << 16) {
            values.extend(self.density_at(chunk));
        }

        let field = DenseField::new([res; 3], min, max, values)?;
        let mesh = extract_isosurface(&field, self.config.isosurface_threshold, Inside::Above);
        log::info!(
            "Extracted isosurface at density {}: {} vertices, {} triangles",
            self.config.isosurface_threshold,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(Mesh::from(mesh))
    }
}
