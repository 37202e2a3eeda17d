//! Ray batches fed to the renderer and the prompt processor.

use burn::prelude::*;

use super::camera::Camera;

/// Rays for a batch of cameras plus the camera angles they came from.
#[derive(Debug, Clone)]
pub struct RayBatch<B: Backend> {
    /// Ray origins, `[B, H, W, 3]`.
    pub rays_o: Tensor<B, 4>,
    /// Unit ray directions, `[B, H, W, 3]`.
    pub rays_d: Tensor<B, 4>,
    /// Camera elevation in degrees, one per batch item.
    pub elevation: Vec<f32>,
    /// Camera azimuth in degrees, one per batch item.
    pub azimuth: Vec<f32>,
    /// Camera distance from the origin, one per batch item.
    pub camera_distances: Vec<f32>,
    /// Image height.
    pub height: usize,
    /// Image width.
    pub width: usize,
}

impl<B: Backend> RayBatch<B> {
    /// Generate one ray per pixel for each camera.
    pub fn from_cameras(cameras: &[Camera], height: usize, width: usize, device: &B::Device) -> Self {
        let pixels = height * width;
        let mut origins = Vec::with_capacity(cameras.len() * pixels * 3);
        let mut directions = Vec::with_capacity(cameras.len() * pixels * 3);

        for camera in cameras {
            let origin = camera.pose.position;
            for y in 0..height {
                for x in 0..width {
                    let d = camera.pixel_to_ray(x, y, width, height);
                    origins.extend_from_slice(&origin.as_array());
                    directions.extend_from_slice(&d.as_array());
                }
            }
        }

        let shape = [cameras.len(), height, width, 3];
        Self {
            rays_o: Tensor::from_data(TensorData::new(origins, shape), device),
            rays_d: Tensor::from_data(TensorData::new(directions, shape), device),
            elevation: cameras.iter().map(|c| c.elevation_deg).collect(),
            azimuth: cameras.iter().map(|c| c.azimuth_deg).collect(),
            camera_distances: cameras.iter().map(|c| c.distance).collect(),
            height,
            width,
        }
    }

    /// Number of cameras.
    pub fn batch_size(&self) -> usize {
        self.elevation.len()
    }

    /// Total number of rays.
    pub fn num_rays(&self) -> usize {
        self.batch_size() * self.height * self.width
    }

    /// Ray origins flattened to `[N, 3]`.
    pub fn flat_origins(&self) -> Tensor<B, 2> {
        self.rays_o.clone().reshape([self.num_rays(), 3])
    }

    /// Ray directions flattened to `[N, 3]`.
    pub fn flat_directions(&self) -> Tensor<B, 2> {
        self.rays_d.clone().reshape([self.num_rays(), 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_shapes_and_angles() {
        let device = Default::default();
        let cameras = vec![
            Camera::orbit(30.0, 0.0, 2.0, 60.0),
            Camera::orbit(30.0, 90.0, 2.0, 60.0),
        ];
        let batch = RayBatch::<TestBackend>::from_cameras(&cameras, 3, 5, &device);

        assert_eq!(batch.rays_o.dims(), [2, 3, 5, 3]);
        assert_eq!(batch.rays_d.dims(), [2, 3, 5, 3]);
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.num_rays(), 30);
        assert_eq!(batch.azimuth, vec![0.0, 90.0]);
        assert_eq!(batch.flat_directions().dims(), [30, 3]);
    }

    #[test]
    fn test_directions_are_unit() {
        let device = Default::default();
        let batch =
            RayBatch::<TestBackend>::from_cameras(&[Camera::orbit(10.0, 45.0, 1.5, 50.0)], 4, 4, &device);
        let d: Vec<f32> = batch.flat_directions().into_data().to_vec().unwrap();
        for v in d.chunks(3) {
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }
}
