//! Training systems.
//!
//! A [`System`] owns the optimizable scene and implements the hooks the
//! [`Trainer`](crate::training::Trainer) calls. Hook order during `fit`:
//!
//! ```text
//! on_fit_start
//! repeat max_steps:
//!     training_step -> backward -> parameter update
//!     every val_check_interval:
//!         on_validation_start, validation_step per view, on_validation_epoch_end
//!     every checkpoint_every_n_steps:
//!         state_dict -> on_save_checkpoint -> write
//! ```
//!
//! and during `test`: `on_test_start`, `test_step` per view,
//! `on_test_epoch_end`.

mod latent_nerf;

pub use latent_nerf::LatentNerfSystem;

use std::path::Path;

use burn::prelude::*;
use dream_io::{ImageData, StateDict, TensorBlob};

use crate::config::Progress;
use crate::data::RayBatch;
use crate::error::{DreamError, Result};
use crate::models::to_vec_f32;
use crate::training::TrainOutput;

/// Lifecycle hooks driven by the trainer.
pub trait System<B: Backend> {
    /// Called once before the first training step.
    fn on_fit_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Compute the total loss for one batch. No backward pass or update.
    fn training_step(&mut self, batch: &RayBatch<B>, progress: Progress) -> Result<TrainOutput<B>>;

    /// Called before each validation pass.
    fn on_validation_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Render and export one validation view.
    fn validation_step(&mut self, batch: &RayBatch<B>, batch_idx: usize, progress: Progress) -> Result<()>;

    /// Called after each validation pass.
    fn on_validation_epoch_end(&mut self, _progress: Progress) -> Result<()> {
        Ok(())
    }

    /// Called before the test pass.
    fn on_test_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Render and export one test view.
    fn test_step(&mut self, batch: &RayBatch<B>, batch_idx: usize, progress: Progress) -> Result<()>;

    /// Called after the test pass.
    fn on_test_epoch_end(&mut self, _progress: Progress) -> Result<()> {
        Ok(())
    }

    /// Trainable tensors with dotted names.
    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)>;

    /// Replace a trainable tensor by dotted name.
    fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> Result<()>;

    /// Every named tensor the system holds, parameters and buffers.
    fn state_dict(&self) -> StateDict;

    /// Adjust a state dict before it is written.
    fn on_save_checkpoint(&self, _state: &mut StateDict) {}

    /// Restore trainable tensors from a state dict.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;

    /// Directory that exports are written under.
    fn save_dir(&self) -> &Path;
}

/// Copy a tensor into a state dict blob.
pub fn tensor_to_blob<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<TensorBlob> {
    let shape = tensor.dims().to_vec();
    Ok(TensorBlob::new(shape, to_vec_f32(tensor))?)
}

/// Build a 2D tensor from a state dict blob.
pub fn blob_to_tensor<B: Backend>(name: &str, blob: &TensorBlob, device: &B::Device) -> Result<Tensor<B, 2>> {
    let [rows, cols] = blob.shape[..] else {
        return Err(DreamError::ShapeMismatch {
            name: name.to_string(),
            expected: vec![0, 0],
            got: blob.shape.clone(),
        });
    };
    Ok(Tensor::from_data(TensorData::new(blob.data.clone(), [rows, cols]), device))
}

/// One batch item of a `[B, H, W, C]` image tensor as HWC image data.
pub fn image_data<B: Backend>(images: Tensor<B, 4>, index: usize) -> Result<ImageData> {
    let [_, height, width, channels] = images.dims();
    let item = images.slice([index..index + 1]);
    Ok(ImageData::new(height, width, channels, to_vec_f32(item))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_blob_conversion() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 2>::from_data([[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]], &device);
        let blob = tensor_to_blob(t).unwrap();
        assert_eq!(blob.shape, vec![3, 2]);
        let back = blob_to_tensor::<TestBackend>("x", &blob, &device).unwrap();
        assert_eq!(to_vec_f32(back), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let flat = TensorBlob::new(vec![6], vec![0.0; 6]).unwrap();
        assert!(blob_to_tensor::<TestBackend>("x", &flat, &device).is_err());
    }

    #[test]
    fn test_image_data_picks_item() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::from_data(
            TensorData::new((0..12).map(|v| v as f32).collect::<Vec<_>>(), [2, 2, 1, 3]),
            &device,
        );
        let second = image_data(images, 1).unwrap();
        assert_eq!((second.height, second.width, second.channels), (2, 1, 3));
        assert_eq!(second.data, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }
}
