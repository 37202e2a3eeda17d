//! Training driver, camera sampling and experiment configuration.

use burn::config::Config;

use super::SystemConfig;
use crate::training::OptimizerConfig;

/// Configuration for random training cameras and orbit evaluation cameras.
///
/// Angles are in degrees. Ranges are `[min, max]`.
#[derive(Config, Debug)]
pub struct CameraConfig {
    /// Rendered image height for training batches.
    #[config(default = 64)]
    pub height: usize,

    /// Rendered image width for training batches.
    #[config(default = 64)]
    pub width: usize,

    /// Number of cameras per training batch.
    #[config(default = 1)]
    pub batch_size: usize,

    /// Elevation range of training cameras.
    #[config(default = "[-10.0, 90.0]")]
    pub elevation_range: [f32; 2],

    /// Azimuth range of training cameras.
    #[config(default = "[-180.0, 180.0]")]
    pub azimuth_range: [f32; 2],

    /// Distance range of training cameras from the origin.
    #[config(default = "[1.0, 1.5]")]
    pub camera_distance_range: [f32; 2],

    /// Vertical field of view range of training cameras.
    #[config(default = "[40.0, 70.0]")]
    pub fovy_range: [f32; 2],

    /// Rendered image height for validation and test views.
    #[config(default = 64)]
    pub eval_height: usize,

    /// Rendered image width for validation and test views.
    #[config(default = 64)]
    pub eval_width: usize,

    /// Elevation of the orbit cameras.
    #[config(default = 15.0)]
    pub eval_elevation_deg: f32,

    /// Distance of the orbit cameras.
    #[config(default = 1.5)]
    pub eval_camera_distance: f32,

    /// Vertical field of view of the orbit cameras.
    #[config(default = 70.0)]
    pub eval_fovy_deg: f32,

    /// Number of orbit views rendered per validation.
    #[config(default = 4)]
    pub n_val_views: usize,

    /// Number of orbit views rendered by the test pass.
    #[config(default = 120)]
    pub n_test_views: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.height == 0 || self.width == 0 || self.eval_height == 0 || self.eval_width == 0 {
            return Err("image sizes must be positive".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be positive".to_string());
        }
        let ranges = [
            ("elevation_range", self.elevation_range),
            ("azimuth_range", self.azimuth_range),
            ("camera_distance_range", self.camera_distance_range),
            ("fovy_range", self.fovy_range),
        ];
        for (name, [lo, hi]) in ranges {
            if lo > hi {
                return Err(format!("{name} must be ordered as [min, max]"));
            }
        }
        if self.camera_distance_range[0] <= 0.0 || self.eval_camera_distance <= 0.0 {
            return Err("camera distances must be positive".to_string());
        }
        if self.fovy_range[0] <= 0.0 || self.fovy_range[1] >= 180.0 || self.eval_fovy_deg <= 0.0 {
            return Err("field of view must be in (0, 180) degrees".to_string());
        }
        Ok(())
    }
}

/// Configuration of the training driver.
#[derive(Config, Debug)]
pub struct TrainerConfig {
    /// Number of optimizer steps.
    #[config(default = 10000)]
    pub max_steps: usize,

    /// Random seed for cameras and tensor sampling.
    #[config(default = 0)]
    pub seed: u64,

    /// Run validation every this many steps (0 = never).
    #[config(default = 200)]
    pub val_check_interval: usize,

    /// Log metrics every this many steps.
    #[config(default = 10)]
    pub log_every_n_steps: usize,

    /// Save a checkpoint every this many steps (0 = only at the end).
    #[config(default = 1000)]
    pub checkpoint_every_n_steps: usize,

    /// Optimizer for the scene parameters.
    #[config(default = "OptimizerConfig::new().with_learning_rate(1e-2)")]
    pub optimizer: OptimizerConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be positive".to_string());
        }
        if self.log_every_n_steps == 0 {
            return Err("log_every_n_steps must be positive".to_string());
        }
        self.optimizer.validate()
    }
}

/// A complete experiment: system, cameras, driver and output location.
#[derive(Config, Debug)]
pub struct ExperimentConfig {
    /// Experiment name, used as the output sub-directory.
    #[config(default = "String::from(\"latentnerf\")")]
    pub name: String,

    /// Root directory for experiment outputs.
    #[config(default = "String::from(\"outputs\")")]
    pub exp_root_dir: String,

    /// Scene optimization system.
    #[config(default = "SystemConfig::new()")]
    pub system: SystemConfig,

    /// Camera sampling.
    #[config(default = "CameraConfig::new()")]
    pub data: CameraConfig,

    /// Training driver.
    #[config(default = "TrainerConfig::new()")]
    pub trainer: TrainerConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        self.system.validate()?;
        self.data.validate()?;
        self.trainer.validate()?;
        Ok(())
    }

    /// Directory that receives images, meshes and checkpoints.
    pub fn output_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.exp_root_dir).join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_experiment_config() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_dir(), std::path::Path::new("outputs/latentnerf"));
    }

    #[test]
    fn test_camera_validation() {
        let config = CameraConfig::new().with_elevation_range([30.0, 10.0]);
        assert!(config.validate().is_err());

        let config = CameraConfig::new().with_fovy_range([40.0, 180.0]);
        assert!(config.validate().is_err());

        let config = CameraConfig::new().with_batch_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trainer_validation() {
        assert!(TrainerConfig::new().with_max_steps(0).validate().is_err());
        assert!(TrainerConfig::new()
            .with_optimizer(OptimizerConfig::new().with_learning_rate(0.0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ExperimentConfig::new()
            .with_name("hamburger".to_string())
            .with_trainer(TrainerConfig::new().with_max_steps(20));
        let json = serde_json::to_string(&config).unwrap();
        let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "hamburger");
        assert_eq!(back.trainer.max_steps, 20);
        assert_eq!(back.data.height, 64);
    }

    #[test]
    fn test_nested_defaults_from_json() {
        let json = r#"{"name": "tiny", "data": {"height": 8, "width": 8}}"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data.height, 8);
        assert_eq!(config.data.n_test_views, 120);
        assert_eq!(config.trainer.max_steps, 10000);
    }
}
