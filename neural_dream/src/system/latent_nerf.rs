//! Latent-space NeRF optimized by score distillation.
//!
//! The scene renders four-channel latent images; the guidance scores them
//! directly (`rgb_as_latents`). With `refinement` the scene renders RGB
//! and the guidance encodes it first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::tensor::ElementConversion;
use dream_io::{export_obj_to_file, save_image_grid, save_img_sequence, GridItem, StateDict};

use super::{blob_to_tensor, image_data, tensor_to_blob, System};
use crate::config::{Progress, SystemConfig};
use crate::data::RayBatch;
use crate::error::{DreamError, Result};
use crate::loss::{opaque_loss, orientation_loss, sparsity_loss, ShapeLoss, ShapeLossConfig};
use crate::models::{Guidance, PromptProcessor, RenderOutput, Renderer, Scene};
use crate::registry::Registry;
use crate::training::TrainOutput;

/// Frame rate of the exported test animation.
const TEST_VIDEO_FPS: u32 = 30;

/// State dict prefixes that are never written to checkpoints.
const UNSAVED_PREFIXES: [&str; 2] = ["prompt_processor", "guidance"];

/// Score-distillation scene optimization in latent space.
pub struct LatentNerfSystem<B: Backend> {
    config: SystemConfig,
    registry: Registry<B>,
    device: B::Device,
    save_dir: PathBuf,
    scene: Scene<B>,
    renderer: Box<dyn Renderer<B>>,
    shape_loss: Option<ShapeLoss>,
    guidance: Option<Box<dyn Guidance<B>>>,
    prompt_processor: Option<Box<dyn PromptProcessor<B>>>,
}

impl<B: Backend> LatentNerfSystem<B> {
    /// Build the scene, renderer and optional shape prior.
    ///
    /// Guidance and the prompt processor are not built here; see
    /// [`setup_guidance`](Self::setup_guidance) and `on_fit_start`.
    pub fn configure(
        config: SystemConfig,
        registry: Registry<B>,
        save_dir: impl Into<PathBuf>,
        device: &B::Device,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DreamError::InvalidConfig { message })?;

        let scene = Scene {
            geometry: registry.geometry(&config.geometry_type, &config.geometry, device)?,
            material: registry.material(&config.material_type, &config.material, device)?,
            background: registry.background(&config.background_type, &config.background, device)?,
        };
        let renderer = registry.renderer(&config.renderer_type, &config.renderer, device)?;

        let shape_loss = match &config.guide_shape {
            Some(path) => Some(ShapeLoss::from_obj(path, ShapeLossConfig::new())?),
            None => None,
        };

        log::info!(
            "Configured {} + {} + {} with {} ({} trainable values)",
            config.geometry_type,
            config.material_type,
            config.background_type,
            config.renderer_type,
            scene.num_params()
        );

        Ok(Self {
            config,
            registry,
            device: device.clone(),
            save_dir: save_dir.into(),
            scene,
            renderer,
            shape_loss,
            guidance: None,
            prompt_processor: None,
        })
    }

    /// System configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The optimizable scene.
    pub fn scene(&self) -> &Scene<B> {
        &self.scene
    }

    /// Whether guidance has been built.
    pub fn has_guidance(&self) -> bool {
        self.guidance.is_some()
    }

    /// Whether the prompt processor has been built.
    pub fn has_prompt_processor(&self) -> bool {
        self.prompt_processor.is_some()
    }

    /// Build guidance if it does not exist yet.
    pub fn setup_guidance(&mut self) -> Result<()> {
        if self.guidance.is_none() {
            let guidance =
                self.registry
                    .guidance(&self.config.guidance_type, &self.config.guidance, &self.device)?;
            self.guidance = Some(guidance);
        }
        Ok(())
    }

    fn setup_prompt_processor(&mut self) -> Result<()> {
        if self.prompt_processor.is_none() {
            let processor = self.registry.prompt_processor(
                &self.config.prompt_processor_type,
                &self.config.prompt_processor,
                &self.device,
            )?;
            self.prompt_processor = Some(processor);
        }
        Ok(())
    }

    /// Render `batch` for evaluation, optionally adding `decoded_rgb`.
    pub fn forward(&self, batch: &RayBatch<B>, decode: bool) -> Result<RenderOutput<B>> {
        self.render(batch, false, decode)
    }

    fn render(&self, batch: &RayBatch<B>, training: bool, decode: bool) -> Result<RenderOutput<B>> {
        let mut out = self.renderer.render(&self.scene, batch, training)?;
        if decode {
            let decoded = if self.config.refinement {
                out.comp_rgb.clone()
            } else {
                let guidance = self.guidance.as_ref().ok_or(DreamError::GuidanceNotReady {
                    component: "guidance",
                })?;
                guidance.decode_latents(out.comp_rgb.clone())
            };
            out.decoded_rgb = Some(decoded);
        }
        Ok(out)
    }

    fn save_grid(&self, out: RenderOutput<B>, relative: &str) -> Result<()> {
        let decoded = out.decoded_rgb.ok_or(DreamError::MissingRenderOutput {
            channel: "decoded_rgb",
            required_by: "image export",
        })?;

        let mut items = vec![GridItem::rgb(image_data(decoded, 0)?)];
        if let Some(normal) = out.comp_normal {
            items.push(GridItem::rgb(image_data(normal, 0)?));
        }
        items.push(GridItem::grayscale(image_data(out.opacity, 0)?));

        let path = self.save_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        save_image_grid(&path, &items)?;
        log::debug!("Saved {}", path.display());
        Ok(())
    }
}

fn scalar<B: Backend>(tensor: &Tensor<B, 1>) -> f32 {
    tensor.clone().into_scalar().elem()
}

impl<B: Backend> System<B> for LatentNerfSystem<B> {
    fn on_fit_start(&mut self) -> Result<()> {
        // Built after the optimizer collects parameters, so neither
        // component is ever optimized.
        self.setup_prompt_processor()?;
        self.setup_guidance()
    }

    fn training_step(&mut self, batch: &RayBatch<B>, progress: Progress) -> Result<TrainOutput<B>> {
        let out = self.render(batch, true, false)?;

        let text = self
            .prompt_processor
            .as_ref()
            .ok_or(DreamError::GuidanceNotReady {
                component: "prompt processor",
            })?
            .encode(batch)?;
        let guidance = self.guidance.as_mut().ok_or(DreamError::GuidanceNotReady {
            component: "guidance",
        })?;
        let guidance_out = guidance.forward(out.comp_rgb.clone(), &text, !self.config.refinement)?;

        let weights = &self.config.loss;
        let lambda = |name: &str| weights.value(name, progress);
        let mut logs = BTreeMap::new();

        logs.insert("train/grad_norm".to_string(), guidance_out.grad_norm);
        logs.insert("train/timestep".to_string(), guidance_out.timestep as f32);
        logs.insert("train/min_step".to_string(), guidance_out.min_step as f32);
        logs.insert("train/max_step".to_string(), guidance_out.max_step as f32);

        let mut loss = Tensor::<B, 1>::zeros([1], &self.device);

        logs.insert("train/loss_sds".to_string(), scalar(&guidance_out.sds));
        loss = loss + guidance_out.sds * lambda("lambda_sds");

        if lambda("lambda_orient") > 0.0 {
            let missing = |channel| DreamError::MissingRenderOutput {
                channel,
                required_by: "lambda_orient",
            };
            let normal = out.normal.clone().ok_or_else(|| missing("normal"))?;
            let t_dirs = out.t_dirs.clone().ok_or_else(|| missing("t_dirs"))?;
            let sample_weights = out.weights.clone().ok_or_else(|| missing("weights"))?;
            let loss_orient = orientation_loss(sample_weights, normal, t_dirs, out.opacity.clone());
            logs.insert("train/loss_orient".to_string(), scalar(&loss_orient));
            loss = loss + loss_orient * lambda("lambda_orient");
        }

        let loss_sparsity = sparsity_loss(out.opacity.clone());
        logs.insert("train/loss_sparsity".to_string(), scalar(&loss_sparsity));
        loss = loss + loss_sparsity * lambda("lambda_sparsity");

        let loss_opaque = opaque_loss(out.opacity.clone());
        logs.insert("train/loss_opaque".to_string(), scalar(&loss_opaque));
        loss = loss + loss_opaque * lambda("lambda_opaque");

        if lambda("lambda_shape") > 0.0 && out.num_samples() > 0 {
            let shape_loss = self.shape_loss.as_ref().ok_or(DreamError::ShapeLossNotConfigured)?;
            let missing = |channel| DreamError::MissingRenderOutput {
                channel,
                required_by: "lambda_shape",
            };
            let points = out.points.clone().ok_or_else(|| missing("points"))?;
            let density = out.density.clone().ok_or_else(|| missing("density"))?;
            let loss_shape = shape_loss.forward(points, density);
            logs.insert("train/loss_shape".to_string(), scalar(&loss_shape));
            loss = loss + loss_shape * lambda("lambda_shape");
        }

        for (name, _) in weights.iter() {
            logs.insert(format!("train_params/{name}"), lambda(name));
        }

        Ok(TrainOutput::new(loss, logs))
    }

    fn on_validation_start(&mut self) -> Result<()> {
        if !self.config.refinement {
            self.setup_guidance()?;
        }
        Ok(())
    }

    fn validation_step(&mut self, batch: &RayBatch<B>, batch_idx: usize, progress: Progress) -> Result<()> {
        let out = self.forward(batch, true)?;
        self.save_grid(out, &format!("it{}-{}.png", progress.global_step, batch_idx))
    }

    fn on_test_start(&mut self) -> Result<()> {
        if !self.config.refinement {
            self.setup_guidance()?;
        }
        Ok(())
    }

    fn test_step(&mut self, batch: &RayBatch<B>, batch_idx: usize, progress: Progress) -> Result<()> {
        let out = self.forward(batch, true)?;
        self.save_grid(out, &format!("it{}-test/{}.png", progress.global_step, batch_idx))
    }

    fn on_test_epoch_end(&mut self, progress: Progress) -> Result<()> {
        let frames = self.save_dir.join(format!("it{}-test", progress.global_step));
        let video = self.save_dir.join(format!("it{}-test.gif", progress.global_step));
        save_img_sequence(&frames, &video, TEST_VIDEO_FPS)?;

        let mesh = self.scene.geometry.isosurface()?;
        let stats = export_obj_to_file(&mesh, self.save_dir.join("mesh.obj"))?;
        log::info!("Exported mesh.obj ({:?})", stats);
        Ok(())
    }

    fn parameters(&self) -> Vec<(String, Tensor<B, 2>)> {
        self.scene.parameters()
    }

    fn set_parameter(&mut self, name: &str, value: Tensor<B, 2>) -> Result<()> {
        self.scene.set_parameter(name, value)
    }

    fn state_dict(&self) -> StateDict {
        let mut tensors = self.scene.parameters();
        tensors.extend(self.scene.buffers());
        if let Some(processor) = &self.prompt_processor {
            tensors.extend(
                processor
                    .buffers()
                    .into_iter()
                    .map(|(name, t)| (format!("prompt_processor.{name}"), t)),
            );
        }
        if let Some(guidance) = &self.guidance {
            tensors.extend(
                guidance
                    .buffers()
                    .into_iter()
                    .map(|(name, t)| (format!("guidance.{name}"), t)),
            );
        }

        let mut state = StateDict::new();
        for (name, tensor) in tensors {
            match tensor_to_blob(tensor) {
                Ok(blob) => {
                    state.insert(name, blob);
                }
                Err(err) => log::warn!("Skipping '{}' in state dict: {}", name, err),
            }
        }
        state
    }

    fn on_save_checkpoint(&self, state: &mut StateDict) {
        state.retain(|name| {
            let head = name.split('.').next().unwrap_or(name);
            !UNSAVED_PREFIXES.contains(&head)
        });
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let mut restored = 0;
        for (name, _) in self.scene.parameters() {
            match state.get(&name) {
                Some(blob) => {
                    let tensor = blob_to_tensor::<B>(&name, blob, &self.device)?.require_grad();
                    self.scene.set_parameter(&name, tensor)?;
                    restored += 1;
                }
                None => log::warn!("State dict has no entry for '{}'", name),
            }
        }
        log::info!("Restored {} scene tensors", restored);
        Ok(())
    }

    fn save_dir(&self) -> &Path {
        &self.save_dir
    }
}
