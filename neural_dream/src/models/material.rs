//! Pass-through material.

use burn::config::Config;
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::error::DreamError;
use crate::models::{Material, Parameterized};

/// Configuration for [`NoMaterial`].
#[derive(Config, Debug)]
pub struct NoMaterialConfig {
    /// Colour channels taken from the front of the feature vector.
    #[config(default = 4)]
    pub n_output_dims: usize,

    /// Squash colours into `(0, 1)`. Off for latent colours.
    #[config(default = false)]
    pub sigmoid: bool,
}

impl Default for NoMaterialConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Uses geometry features directly as colour.
#[derive(Debug, Clone)]
pub struct NoMaterial {
    config: NoMaterialConfig,
}

impl NoMaterial {
    /// Create the material.
    pub fn new(config: NoMaterialConfig) -> crate::error::Result<Self> {
        if config.n_output_dims == 0 {
            return Err(DreamError::InvalidConfig {
                message: "n_output_dims must be positive".to_string(),
            });
        }
        Ok(Self { config })
    }
}

impl<B: Backend> Parameterized<B> for NoMaterial {
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }

    fn set_parameter(&mut self, name: &str, _value: Tensor<B, 2>) -> crate::error::Result<()> {
        Err(DreamError::UnknownParameter {
            name: name.to_string(),
        })
    }
}

impl<B: Backend> Material<B> for NoMaterial {
    fn n_output_dims(&self) -> usize {
        self.config.n_output_dims
    }

    fn forward(&self, features: Tensor<B, 2>, _view_dirs: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = features.dims();
        let color = features.slice([0..n, 0..self.config.n_output_dims]);
        if self.config.sigmoid {
            sigmoid(color)
        } else {
            color
        }
    }
}
