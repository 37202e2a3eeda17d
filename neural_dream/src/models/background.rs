//! Constant-colour background.

use burn::config::Config;
use burn::prelude::*;

use crate::error::DreamError;
use crate::models::{check_shape, Background, Parameterized};

/// Configuration for [`SolidColorBackground`].
#[derive(Config, Debug)]
pub struct SolidColorBackgroundConfig {
    /// Initial colour; its length sets the channel count.
    #[config(default = "vec![1.0, 1.0, 1.0, 1.0]")]
    pub color: Vec<f32>,

    /// Optimize the colour with the scene.
    #[config(default = false)]
    pub learned: bool,
}

impl Default for SolidColorBackgroundConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The same colour in every direction.
#[derive(Debug)]
pub struct SolidColorBackground<B: Backend> {
    /// Colour, `[1, C]`.
    pub color: Tensor<B, 2>,
    learned: bool,
}

impl<B: Backend> SolidColorBackground<B> {
    /// Create the background.
    pub fn new(config: SolidColorBackgroundConfig, device: &B::Device) -> crate::error::Result<Self> {
        if config.color.is_empty() {
            return Err(DreamError::InvalidConfig {
                message: "background color must have at least one channel".to_string(),
            });
        }
        let channels = config.color.len();
        let color = Tensor::from_data(TensorData::new(config.color, [1, channels]), device);
        let color = if config.learned { color.require_grad() } else { color };
        Ok(Self {
            color,
            learned: config.learned,
        })
    }
}

impl<B: Backend> Parameterized<B> for SolidColorBackground<B> {
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        if self.learned {
            vec![("color".to_string(), self.color.clone())]
        } else {
            Vec::new()
        }
    }

    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        if self.learned {
            Vec::new()
        } else {
            vec![("color".to_string(), self.color.clone())]
        }
    }

    fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> crate::error::Result<()> {
        match name {
            "color" => {
                check_shape(name, &self.color, &value)?;
                self.color = value;
                Ok(())
            }
            _ => Err(DreamError::UnknownParameter {
                name: name.to_string(),
            }),
        }
    }
}

impl<B: Backend> Background<B> for SolidColorBackground<B> {
    fn n_output_dims(&self) -> usize {
        self.color.dims()[1]
    }

    fn forward(&self, dirs: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = dirs.dims();
        self.color.clone().repeat_dim(0, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_constant_color() {
        let device = Default::default();
        let config = SolidColorBackgroundConfig::new().with_color(vec![0.2, 0.4, 0.6]);
        let background = SolidColorBackground::<TestBackend>::new(config, &device).unwrap();
        assert_eq!(background.n_output_dims(), 3);

        let out = background.forward(Tensor::zeros([4, 3], &device));
        assert_eq!(out.dims(), [4, 3]);
        let values: Vec<f32> = out.into_data().to_vec().unwrap();
        assert_eq!(&values[9..12], &[0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_learned_color_is_a_parameter() {
        let device = Default::default();
        let fixed = SolidColorBackground::<TestBackend>::new(SolidColorBackgroundConfig::new(), &device).unwrap();
        assert!(fixed.parameters().is_empty());
        assert_eq!(fixed.buffers().len(), 1);

        let learned = SolidColorBackground::<TestBackend>::new(
            SolidColorBackgroundConfig::new().with_learned(true),
            &device,
        )
        .unwrap();
        assert_eq!(learned.parameters().len(), 1);
        assert!(learned.buffers().is_empty());
    }

    #[test]
    fn test_empty_color_rejected() {
        let config = SolidColorBackgroundConfig::new().with_color(Vec::new());
        assert!(SolidColorBackground::<TestBackend>::new(config, &Default::default()).is_err());
    }
}
