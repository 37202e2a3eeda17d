//! Training driver.

use std::path::PathBuf;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::config::{CameraConfig, ExperimentConfig, Progress, TrainerConfig};
use crate::data::CameraSampler;
use crate::error::{DreamError, Result};
use crate::system::System;

use super::checkpoint::{checkpoint_dir, find_latest_checkpoint, load_checkpoint, save_checkpoint, CheckpointMetadata};
use super::metrics::MetricsTracker;
use super::optimizer::SceneOptimizer;

/// Checkpoints live under `<save_dir>/ckpts`.
const CHECKPOINT_SUBDIR: &str = "ckpts";

/// Drives a [`System`] through fit, validation, checkpointing and test.
///
/// The trainer owns the camera sampler and one RMSprop state per scene
/// parameter. Gradients are taken on the autodiff backend and the update is
/// applied on the inner backend, after which the new tensor is handed back
/// to the system marked as requiring gradients.
#[derive(Debug)]
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    sampler: CameraSampler,
    optimizer: SceneOptimizer<B::InnerBackend>,
    metrics: MetricsTracker,
    progress: Progress,
    name: String,
    last_loss: f32,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer.
    pub fn new(
        config: TrainerConfig,
        cameras: CameraConfig,
        name: impl Into<String>,
        device: &B::Device,
    ) -> Result<Self> {
        config
            .validate()
            .and_then(|_| cameras.validate())
            .map_err(|message| DreamError::InvalidConfig { message })?;

        let sampler = CameraSampler::new(cameras, config.seed);
        let optimizer = SceneOptimizer::new(config.optimizer.clone());
        let metrics = MetricsTracker::new(config.log_every_n_steps);

        Ok(Self {
            config,
            sampler,
            optimizer,
            metrics,
            progress: Progress::default(),
            name: name.into(),
            last_loss: f32::NAN,
            device: device.clone(),
        })
    }

    /// Create a trainer for the driver and camera sections of an experiment.
    pub fn from_experiment(experiment: &ExperimentConfig, device: &B::Device) -> Result<Self> {
        Self::new(
            experiment.trainer.clone(),
            experiment.data.clone(),
            experiment.name.clone(),
            device,
        )
    }

    /// Trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Current training progress.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Total loss of the most recent step (NaN before the first step).
    pub fn last_loss(&self) -> f32 {
        self.last_loss
    }

    /// Run the optimization loop up to `max_steps`.
    ///
    /// Starts from the current progress, so a resumed trainer continues
    /// where its checkpoint left off. The first failing hook aborts the run.
    pub fn fit<S: System<B>>(&mut self, system: &mut S) -> Result<()> {
        B::seed(self.config.seed.wrapping_add(self.progress.global_step as u64));
        system.on_fit_start()?;

        let max_steps = self.config.max_steps;
        if self.progress.global_step >= max_steps {
            log::info!("Already at step {}, nothing to fit", self.progress.global_step);
            return Ok(());
        }
        log::info!(
            "Fitting '{}' from step {} to {}",
            self.name,
            self.progress.global_step,
            max_steps
        );

        let mut last_saved = None;
        while self.progress.global_step < max_steps {
            self.train_step(system)?;
            let step = self.progress.global_step;

            if step % self.config.log_every_n_steps == 0 || step == max_steps {
                self.metrics.log(step, max_steps);
            }

            if self.config.val_check_interval > 0 && step % self.config.val_check_interval == 0 {
                self.validate(system)?;
            }

            if self.config.checkpoint_every_n_steps > 0 && step % self.config.checkpoint_every_n_steps == 0 {
                self.save_checkpoint(system)?;
                last_saved = Some(step);
            }
        }

        if last_saved != Some(max_steps) {
            self.save_checkpoint(system)?;
        }
        Ok(())
    }

    fn train_step<S: System<B>>(&mut self, system: &mut S) -> Result<()> {
        let batch = self.sampler.sample::<B>(&self.device);
        let output = system.training_step(&batch, self.progress)?;

        let loss = output.loss_value();
        if !loss.is_finite() {
            return Err(DreamError::TrainingError {
                message: format!("non-finite loss {} at step {}", loss, self.progress.global_step),
            });
        }

        let grads = output.loss.backward();
        let mut updated = 0;
        for (name, param) in system.parameters() {
            let Some(grad) = param.grad(&grads) else {
                continue;
            };
            let new_param = self.optimizer.step(&name, param.inner(), grad);
            system.set_parameter(&name, Tensor::from_inner(new_param).require_grad())?;
            updated += 1;
        }
        if updated == 0 {
            log::debug!("Step {}: no parameter received a gradient", self.progress.global_step);
        }

        self.metrics.add(&output.logs);
        self.last_loss = loss;
        self.progress.global_step += 1;
        Ok(())
    }

    /// Render every validation orbit view.
    pub fn validate<S: System<B>>(&mut self, system: &mut S) -> Result<()> {
        let n_views = self.sampler.config().n_val_views;
        system.on_validation_start()?;
        for (batch_idx, camera) in self.sampler.eval_cameras(n_views).iter().enumerate() {
            let batch = self.sampler.eval_batch::<B>(camera, &self.device);
            system.validation_step(&batch, batch_idx, self.progress)?;
        }
        system.on_validation_epoch_end(self.progress)
    }

    /// Render every test orbit view and finalize the exports.
    pub fn test<S: System<B>>(&mut self, system: &mut S) -> Result<()> {
        let n_views = self.sampler.config().n_test_views;
        log::info!("Testing '{}' on {} views", self.name, n_views);
        system.on_test_start()?;
        for (batch_idx, camera) in self.sampler.eval_cameras(n_views).iter().enumerate() {
            let batch = self.sampler.eval_batch::<B>(camera, &self.device);
            system.test_step(&batch, batch_idx, self.progress)?;
        }
        system.on_test_epoch_end(self.progress)
    }

    /// Write a filtered checkpoint for the current step.
    pub fn save_checkpoint<S: System<B>>(&self, system: &S) -> Result<PathBuf> {
        let mut state = system.state_dict();
        system.on_save_checkpoint(&mut state);

        let dir = checkpoint_dir(&system.save_dir().join(CHECKPOINT_SUBDIR), self.progress.global_step);
        let metadata = CheckpointMetadata::new(self.name.clone(), self.progress).with_last_loss(self.last_loss);
        save_checkpoint(&dir, &state, &metadata)?;
        Ok(dir)
    }

    /// Restore the latest checkpoint under the system's save directory.
    ///
    /// Returns the restored progress, or `None` when there is no checkpoint.
    /// Optimizer statistics are not checkpointed and restart from zero.
    pub fn resume<S: System<B>>(&mut self, system: &mut S) -> Result<Option<Progress>> {
        let Some(dir) = find_latest_checkpoint(&system.save_dir().join(CHECKPOINT_SUBDIR)) else {
            log::info!("No checkpoint under {}", system.save_dir().display());
            return Ok(None);
        };

        let (state, metadata) = load_checkpoint(&dir)?;
        system.load_state_dict(&state)?;

        self.progress = metadata.progress();
        self.last_loss = metadata.last_loss;
        self.sampler = CameraSampler::new(
            self.sampler.config().clone(),
            self.config.seed.wrapping_add(self.progress.global_step as u64),
        );
        log::info!("Resumed '{}' at step {}", metadata.name, self.progress.global_step);
        Ok(Some(self.progress))
    }
}
