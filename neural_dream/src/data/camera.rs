//! Cameras orbiting the scene origin.
//!
//! The world is +Z up. A camera at elevation `e` and azimuth `a` (degrees)
//! sits at `d * (cos e cos a, cos e sin a, sin e)` and looks at the origin.
//! Training cameras are drawn uniformly from configured ranges; validation
//! and test cameras sweep a full circle at a fixed elevation.

use burn::prelude::*;
use dream_core::Point3;

use super::batch::RayBatch;
use super::rng::Lcg;
use crate::config::CameraConfig;

/// Camera pose in 3D space.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    /// Camera position in world coordinates.
    pub position: Point3,
    /// Forward direction (normalized).
    pub forward: Point3,
    /// Up direction (normalized).
    pub up: Point3,
    /// Right direction (computed from forward x up).
    pub right: Point3,
}

impl Pose {
    /// Create a new pose from position and look-at target.
    ///
    /// When looking straight along `up`, +Y is used as the up hint instead.
    pub fn look_at(position: Point3, target: Point3, up: Point3) -> Self {
        let forward = (target - position).normalize();
        let mut right = forward.cross(up);
        if right.length_squared() < 1e-12 {
            right = forward.cross(Point3::new(0.0, 1.0, 0.0));
        }
        let right = right.normalize();
        let up = right.cross(forward).normalize();

        Self {
            position,
            forward,
            up,
            right,
        }
    }

    /// Transform a direction from camera space to world space.
    pub fn transform_direction(&self, dir: Point3) -> Point3 {
        self.right * dir.x + self.up * dir.y + self.forward * dir.z
    }
}

/// A pinhole camera looking at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// World pose.
    pub pose: Pose,
    /// Vertical field of view in degrees.
    pub fovy_deg: f32,
    /// Elevation in degrees.
    pub elevation_deg: f32,
    /// Azimuth in degrees.
    pub azimuth_deg: f32,
    /// Distance from the origin.
    pub distance: f32,
}

impl Camera {
    /// Camera on the sphere of radius `distance` looking at the origin.
    pub fn orbit(elevation_deg: f32, azimuth_deg: f32, distance: f32, fovy_deg: f32) -> Self {
        let ele = elevation_deg.to_radians();
        let azi = azimuth_deg.to_radians();
        let position = Point3::new(
            distance * ele.cos() * azi.cos(),
            distance * ele.cos() * azi.sin(),
            distance * ele.sin(),
        );
        Self {
            pose: Pose::look_at(position, Point3::ZERO, Point3::new(0.0, 0.0, 1.0)),
            fovy_deg,
            elevation_deg,
            azimuth_deg,
            distance,
        }
    }

    /// Unit world-space direction through the centre of pixel `(x, y)`.
    ///
    /// Row 0 is the top of the image.
    pub fn pixel_to_ray(&self, x: usize, y: usize, width: usize, height: usize) -> Point3 {
        let tan_half = (self.fovy_deg.to_radians() * 0.5).tan();
        let aspect = width as f32 / height as f32;
        let ndc_x = ((x as f32 + 0.5) / width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((y as f32 + 0.5) / height as f32) * 2.0;
        let dir_camera = Point3::new(ndc_x * tan_half * aspect, ndc_y * tan_half, 1.0);
        self.pose.transform_direction(dir_camera).normalize()
    }
}

/// Cameras evenly spaced in azimuth, starting at azimuth 0.
pub fn orbit_cameras(
    n_views: usize,
    elevation_deg: f32,
    distance: f32,
    fovy_deg: f32,
) -> Vec<Camera> {
    (0..n_views)
        .map(|i| {
            let azimuth = 360.0 * i as f32 / n_views as f32;
            Camera::orbit(elevation_deg, azimuth, distance, fovy_deg)
        })
        .collect()
}

/// Draws random training cameras and builds evaluation orbits.
#[derive(Debug, Clone)]
pub struct CameraSampler {
    config: CameraConfig,
    rng: Lcg,
}

impl CameraSampler {
    /// Create a sampler.
    pub fn new(config: CameraConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Lcg::new(seed),
        }
    }

    /// Sampler configuration.
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Draw one random camera.
    pub fn sample_camera(&mut self) -> Camera {
        let [ele_lo, ele_hi] = self.config.elevation_range;
        let [azi_lo, azi_hi] = self.config.azimuth_range;
        let [dist_lo, dist_hi] = self.config.camera_distance_range;
        let [fov_lo, fov_hi] = self.config.fovy_range;

        let elevation = self.rng.uniform(ele_lo, ele_hi);
        let azimuth = self.rng.uniform(azi_lo, azi_hi);
        let distance = self.rng.uniform(dist_lo, dist_hi);
        let fovy = self.rng.uniform(fov_lo, fov_hi);
        Camera::orbit(elevation, azimuth, distance, fovy)
    }

    /// Draw a training batch of `batch_size` random cameras.
    pub fn sample<B: Backend>(&mut self, device: &B::Device) -> RayBatch<B> {
        let cameras: Vec<Camera> = (0..self.config.batch_size)
            .map(|_| self.sample_camera())
            .collect();
        RayBatch::from_cameras(&cameras, self.config.height, self.config.width, device)
    }

    /// Orbit of `n_views` evaluation cameras.
    pub fn eval_cameras(&self, n_views: usize) -> Vec<Camera> {
        orbit_cameras(
            n_views,
            self.config.eval_elevation_deg,
            self.config.eval_camera_distance,
            self.config.eval_fovy_deg,
        )
    }

    /// Single-view batch for one evaluation camera.
    pub fn eval_batch<B: Backend>(&self, camera: &Camera, device: &B::Device) -> RayBatch<B> {
        RayBatch::from_cameras(
            std::slice::from_ref(camera),
            self.config.eval_height,
            self.config.eval_width,
            device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_position() {
        let camera = Camera::orbit(0.0, 90.0, 2.0, 60.0);
        let p = camera.pose.position;
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
        assert!(p.z.abs() < 1e-5);

        let camera = Camera::orbit(90.0, 0.0, 1.5, 60.0);
        assert!((camera.pose.position.z - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_center_ray_hits_origin() {
        let camera = Camera::orbit(30.0, 45.0, 2.0, 60.0);
        let d = camera.pixel_to_ray(2, 2, 5, 5);
        let to_origin = (Point3::ZERO - camera.pose.position).normalize();
        assert!(d.dot(to_origin) > 0.9999);
    }

    #[test]
    fn test_image_up_is_world_up() {
        let camera = Camera::orbit(0.0, 0.0, 2.0, 60.0);
        let top = camera.pixel_to_ray(1, 0, 3, 3);
        let bottom = camera.pixel_to_ray(1, 2, 3, 3);
        assert!(top.z > 0.0);
        assert!(bottom.z < 0.0);
    }

    #[test]
    fn test_overhead_camera_is_finite() {
        let camera = Camera::orbit(90.0, 0.0, 2.0, 60.0);
        let d = camera.pixel_to_ray(0, 0, 4, 4);
        assert!(d.x.is_finite() && d.y.is_finite() && d.z.is_finite());
        assert!((camera.pose.right.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_cameras_sweep() {
        let cameras = orbit_cameras(4, 15.0, 1.5, 70.0);
        let azimuths: Vec<f32> = cameras.iter().map(|c| c.azimuth_deg).collect();
        assert_eq!(azimuths, vec![0.0, 90.0, 180.0, 270.0]);
        assert!(cameras.iter().all(|c| c.elevation_deg == 15.0));
    }

    #[test]
    fn test_sampler_respects_ranges() {
        let config = CameraConfig::new()
            .with_elevation_range([0.0, 30.0])
            .with_azimuth_range([-90.0, 90.0])
            .with_camera_distance_range([1.0, 2.0]);
        let mut sampler = CameraSampler::new(config, 5);
        for _ in 0..200 {
            let c = sampler.sample_camera();
            assert!((0.0..=30.0).contains(&c.elevation_deg));
            assert!((-90.0..=90.0).contains(&c.azimuth_deg));
            assert!((1.0..=2.0).contains(&c.distance));
            assert!((c.pose.position.length() - c.distance).abs() < 1e-4);
        }
    }
}
