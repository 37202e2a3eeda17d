//! Shape prior from a guide mesh.

use std::path::Path;

use burn::config::Config;
use burn::prelude::*;
use dream_core::Point3;
use dream_io::{parse_obj_file, Mesh, SignedDistanceMesh};

use super::regularization::weighted_binary_cross_entropy;
use crate::error::DreamError;
use crate::models::to_vec_f32;

/// Configuration for [`ShapeLoss`].
#[derive(Config, Debug)]
pub struct ShapeLossConfig {
    /// Distance of the farthest guide vertex from the origin after fitting.
    #[config(default = 0.7)]
    pub mesh_scale: f32,

    /// Distance scale over which points near the guide surface are discounted.
    #[config(default = 0.3)]
    pub proximal_surface: f32,

    /// Density to occupancy factor, `occ = 1 - exp(-delta * density)`.
    #[config(default = 0.2)]
    pub delta: f32,
}

impl Default for ShapeLossConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary cross-entropy between NeRF occupancy and guide-mesh occupancy.
///
/// For every sample point:
/// - `target = 1` inside the mesh, 0 outside
/// - `weight = 1 - exp(-|sdf| / proximal_surface)`
/// - `occ = clamp(1 - exp(-delta · density), 0, 1)`
///
/// Loss is the weighted mean BCE of `occ` against `target`.
#[derive(Debug, Clone)]
pub struct ShapeLoss {
    config: ShapeLossConfig,
    guide: SignedDistanceMesh,
}

impl ShapeLoss {
    /// Load the guide mesh from an OBJ file.
    pub fn from_obj<P: AsRef<Path>>(path: P, config: ShapeLossConfig) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let mesh = parse_obj_file(path)?;
        log::info!(
            "Loaded guide shape {} ({} vertices, {} faces)",
            path.display(),
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Self::from_mesh(mesh, config)
    }

    /// Fit `mesh` to `mesh_scale` and prepare it for distance queries.
    pub fn from_mesh(mesh: Mesh, config: ShapeLossConfig) -> crate::error::Result<Self> {
        if mesh.is_empty() {
            return Err(DreamError::InvalidData("guide shape has no faces".to_string()));
        }
        if config.proximal_surface <= 0.0 {
            return Err(DreamError::InvalidConfig {
                message: "proximal_surface must be positive".to_string(),
            });
        }
        let guide = SignedDistanceMesh::new(mesh.normalized(config.mesh_scale));
        Ok(Self { config, guide })
    }

    /// The fitted guide mesh.
    pub fn mesh(&self) -> &Mesh {
        self.guide.mesh()
    }

    /// Loss configuration.
    pub fn config(&self) -> &ShapeLossConfig {
        &self.config
    }

    /// Shape loss for sample `points` (`[N, 3]`) with `density` (`[N, 1]`).
    pub fn forward<B: Backend>(&self, points: Tensor<B, 2>, density: Tensor<B, 2>) -> Tensor<B, 1> {
        let device = density.device();
        let [n, _] = points.dims();

        let coords = to_vec_f32(points.detach());
        let points: Vec<Point3> = coords
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        let sdf = self.guide.signed_distances(&points);

        let (target, weight): (Vec<f32>, Vec<f32>) = sdf
            .iter()
            .map(|&d| {
                let inside = if d < 0.0 { 1.0 } else { 0.0 };
                (inside, 1.0 - (-d.abs() / self.config.proximal_surface).exp())
            })
            .unzip();

        let target = Tensor::<B, 2>::from_data(TensorData::new(target, [n, 1]), &device);
        let weight = Tensor::<B, 2>::from_data(TensorData::new(weight, [n, 1]), &device);

        let occupancy = (density * (-self.config.delta)).exp().neg().add_scalar(1.0).clamp(0.0, 1.0);
        weighted_binary_cross_entropy(occupancy, target, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn cube() -> Mesh {
        let v = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [3, 0, 4],
            [3, 4, 7],
        ];
        Mesh::new(v.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(), faces)
    }

    #[test]
    fn test_guide_is_fitted() {
        let loss = ShapeLoss::from_mesh(cube(), ShapeLossConfig::new()).unwrap();
        let r = loss
            .mesh()
            .v_pos
            .iter()
            .map(|v| v.length())
            .fold(0.0f32, f32::max);
        assert!((r - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_matching_occupancy_beats_mismatch() {
        let device = Default::default();
        let loss = ShapeLoss::from_mesh(cube(), ShapeLossConfig::new()).unwrap();
        // One point deep inside, one far outside.
        let points = Tensor::<TestBackend, 2>::from_data([[0.0f32, 0.0, 0.0], [0.0, 0.0, 1.5]], &device);

        let matching = Tensor::<TestBackend, 2>::from_data([[100.0f32], [0.0]], &device);
        let inverted = Tensor::<TestBackend, 2>::from_data([[0.0f32], [100.0]], &device);

        let good: f32 = loss.forward(points.clone(), matching).to_data().to_vec().unwrap()[0];
        let bad: f32 = loss.forward(points, inverted).to_data().to_vec().unwrap()[0];
        assert!(good < 0.01, "matching occupancy loss {}", good);
        assert!(bad > good);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let empty = Mesh::new(Vec::new(), Vec::new());
        assert!(ShapeLoss::from_mesh(empty, ShapeLossConfig::new()).is_err());
    }
}
