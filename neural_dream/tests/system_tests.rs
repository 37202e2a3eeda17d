//! Integration tests for the latent scene optimization system.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use dream_core::{extract_isosurface, DenseField, Inside};
use dream_io::{export_obj_to_file, TensorBlob};
use neural_dream::models::{
    NerfRendererConfig, NerfVolumeRenderer, RenderOutput, Renderer, Scene, ScoreDistillationConfig,
    ScoreDistillationGuidance,
};
use neural_dream::registry::parse_options;
use neural_dream::{
    data::{Camera, RayBatch},
    DreamError, LatentNerfSystem, LossWeights, Point3, Progress, Registry, Result, StateDict, System,
    SystemConfig,
};

type TrainBackend = Autodiff<NdArray>;

// =============================================================================
// Test Helpers
// =============================================================================

/// Built-in renderer with the per-sample points removed.
struct PointlessRenderer(NerfVolumeRenderer);

impl<B: Backend> Renderer<B> for PointlessRenderer {
    fn render(&self, scene: &Scene<B>, batch: &RayBatch<B>, training: bool) -> Result<RenderOutput<B>> {
        let mut out = self.0.render(scene, batch, training)?;
        out.points = None;
        out.density = None;
        Ok(out)
    }
}

fn tiny_config() -> SystemConfig {
    SystemConfig::new()
        .with_geometry(json!({"grid_resolution": 6, "isosurface_resolution": 12}))
        .with_renderer(json!({"num_samples_per_ray": 8}))
        .with_guidance(json!({"embedding_dim": 16}))
        .with_prompt_processor(json!({"embedding_dim": 16}))
}

/// Built-ins plus a "counting" guidance and a "pointless" renderer.
fn test_registry(built: Arc<AtomicUsize>) -> Registry<TrainBackend> {
    let mut registry = Registry::with_builtins();
    registry.register_guidance("counting", move |options, device| {
        built.fetch_add(1, Ordering::SeqCst);
        let config: ScoreDistillationConfig = parse_options("guidance", "counting", options)?;
        Ok(Box::new(ScoreDistillationGuidance::new(config, device)?))
    });
    registry.register_renderer("pointless", |options, _device| {
        let config: NerfRendererConfig = parse_options("renderer", "pointless", options)?;
        Ok(Box::new(PointlessRenderer(NerfVolumeRenderer::new(config)?)))
    });
    registry
}

fn configure(config: SystemConfig, dir: &Path) -> LatentNerfSystem<TrainBackend> {
    let registry = test_registry(Arc::new(AtomicUsize::new(0)));
    LatentNerfSystem::configure(config, registry, dir, &Default::default()).unwrap()
}

fn batch() -> RayBatch<TrainBackend> {
    RayBatch::from_cameras(&[Camera::orbit(20.0, 30.0, 1.5, 60.0)], 3, 3, &Default::default())
}

fn step_loss(loss: LossWeights) -> f32 {
    let dir = TempDir::new().unwrap();
    let mut system = configure(tiny_config().with_loss(loss), dir.path());
    system.on_fit_start().unwrap();
    system.training_step(&batch(), Progress::default()).unwrap().loss_value()
}

fn write_sphere_obj(path: &Path, radius: f32) {
    let field = DenseField::from_fn(
        [16, 16, 16],
        Point3::new(-1.0, -1.0, -1.0),
        Point3::new(1.0, 1.0, 1.0),
        |p| p.length() - radius,
    )
    .unwrap();
    let mesh: dream_io::Mesh = extract_isosurface(&field, 0.0, Inside::Below).into();
    export_obj_to_file(&mesh, path).unwrap();
}

// =============================================================================
// Deferred guidance
// =============================================================================

#[test]
fn test_guidance_built_at_most_once() {
    let dir = TempDir::new().unwrap();
    let built = Arc::new(AtomicUsize::new(0));
    let config = tiny_config().with_guidance_type("counting".to_string());
    let mut system =
        LatentNerfSystem::configure(config, test_registry(built.clone()), dir.path(), &Default::default()).unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    system.on_fit_start().unwrap();
    system.on_validation_start().unwrap();
    system.on_test_start().unwrap();
    system.setup_guidance().unwrap();
    system.on_fit_start().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_refinement_never_builds_guidance() {
    let dir = TempDir::new().unwrap();
    let built = Arc::new(AtomicUsize::new(0));
    let config = tiny_config()
        .with_guidance_type("counting".to_string())
        .with_refinement(true)
        .with_material(json!({"n_output_dims": 3}))
        .with_background(json!({"color": [0.0, 0.0, 0.0]}));
    let mut system =
        LatentNerfSystem::configure(config, test_registry(built.clone()), dir.path(), &Default::default()).unwrap();

    system.on_validation_start().unwrap();
    system.validation_step(&batch(), 0, Progress::at_step(1)).unwrap();
    system.on_test_start().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_guidance_tag_fails_at_fit_start() {
    let dir = TempDir::new().unwrap();
    let config = tiny_config().with_guidance_type("missing".to_string());
    let mut system = configure(config, dir.path());
    assert!(matches!(
        system.on_fit_start(),
        Err(DreamError::UnknownComponent { kind: "guidance", .. })
    ));
}

// =============================================================================
// Loss aggregation
// =============================================================================

#[test]
fn test_weights_increase_loss() {
    let base = LossWeights::latent_nerf().with("lambda_sds", 0.0);
    let base_loss = step_loss(base.clone());
    assert!(base_loss.abs() < 1e-6);

    let sparse = step_loss(base.clone().with("lambda_sparsity", 1.0));
    assert!(sparse >= base_loss + 0.1 - 1e-6);

    let opaque = step_loss(base.with("lambda_opaque", 1.0));
    assert!(opaque > base_loss);
}

#[test]
fn test_orientation_term_enters_loss() {
    let dir = TempDir::new().unwrap();
    // A faint blob keeps transmittance past the origin, where normals face
    // away from the camera.
    let config = tiny_config()
        .with_geometry(json!({"grid_resolution": 6, "density_blob_scale": 1.0}))
        .with_loss(LossWeights::latent_nerf().with("lambda_sds", 0.0).with("lambda_orient", 10.0));
    let mut system = configure(config, dir.path());
    system.on_fit_start().unwrap();

    let out = system.training_step(&batch(), Progress::default()).unwrap();
    let orient = out.get("train/loss_orient").unwrap();
    assert!(orient > 0.0);
    assert!((out.loss_value() - 10.0 * orient).abs() <= 1e-4 * (1.0 + orient));
}

#[test]
fn test_shape_term_enters_loss() {
    let dir = TempDir::new().unwrap();
    let guide = dir.path().join("guide.obj");
    write_sphere_obj(&guide, 0.5);

    let config = tiny_config()
        .with_guide_shape(Some(guide.to_string_lossy().into_owned()))
        .with_loss(LossWeights::latent_nerf().with("lambda_sds", 0.0).with("lambda_shape", 2.0));
    let mut system = configure(config, &dir.path().join("run"));
    system.on_fit_start().unwrap();

    let out = system.training_step(&batch(), Progress::default()).unwrap();
    let shape = out.get("train/loss_shape").unwrap();
    assert!(shape > 0.0);
    assert!((out.loss_value() - 2.0 * shape).abs() <= 1e-4 * (1.0 + shape));
}

#[test]
fn test_sds_weight_scales_loss() {
    let dir = TempDir::new().unwrap();
    let loss = LossWeights::latent_nerf().with("lambda_sds", 2.0);
    let mut system = configure(tiny_config().with_loss(loss), dir.path());
    system.on_fit_start().unwrap();

    let out = system.training_step(&batch(), Progress::default()).unwrap();
    let sds = out.get("train/loss_sds").unwrap();
    assert!(sds.is_finite() && sds >= 0.0);
    assert!((out.loss_value() - 2.0 * sds).abs() <= 1e-4 * (1.0 + sds));
}

#[test]
fn test_scheduled_weight_is_logged_per_step() {
    let dir = TempDir::new().unwrap();
    let loss = LossWeights::latent_nerf().with(
        "lambda_sparsity",
        neural_dream::WeightSchedule::Linear {
            start_step: 0,
            start_value: 0.0,
            end_value: 1.0,
            end_step: 10,
        },
    );
    let mut system = configure(tiny_config().with_loss(loss), dir.path());
    system.on_fit_start().unwrap();

    let early = system.training_step(&batch(), Progress::at_step(0)).unwrap();
    let middle = system.training_step(&batch(), Progress::at_step(5)).unwrap();
    let late = system.training_step(&batch(), Progress::at_step(50)).unwrap();
    assert_eq!(early.get("train_params/lambda_sparsity"), Some(0.0));
    assert_eq!(middle.get("train_params/lambda_sparsity"), Some(0.5));
    assert_eq!(late.get("train_params/lambda_sparsity"), Some(1.0));
}

// =============================================================================
// Shape prior
// =============================================================================

#[test]
fn test_shape_skipped_without_sample_points() {
    let dir = TempDir::new().unwrap();
    let config = tiny_config()
        .with_renderer_type("pointless".to_string())
        .with_loss(LossWeights::latent_nerf().with("lambda_shape", 1.0));
    let mut system = configure(config, dir.path());
    system.on_fit_start().unwrap();

    // No guide shape is configured, so evaluating the term would fail.
    let out = system.training_step(&batch(), Progress::default()).unwrap();
    assert!(out.get("train/loss_shape").is_none());
    assert_eq!(out.get("train_params/lambda_shape"), Some(1.0));
}

#[test]
fn test_shape_prior_from_guide_obj() {
    let dir = TempDir::new().unwrap();
    let guide = dir.path().join("guide.obj");
    write_sphere_obj(&guide, 0.5);

    let config = tiny_config()
        .with_guide_shape(Some(guide.to_string_lossy().into_owned()))
        .with_loss(LossWeights::latent_nerf().with("lambda_shape", 1.0));
    let mut system = configure(config, &dir.path().join("run"));
    system.on_fit_start().unwrap();

    let out = system.training_step(&batch(), Progress::default()).unwrap();
    let shape = out.get("train/loss_shape").unwrap();
    assert!(shape.is_finite() && shape > 0.0);
}

#[test]
fn test_missing_guide_obj_fails_configure() {
    let dir = TempDir::new().unwrap();
    let config = tiny_config().with_guide_shape(Some(dir.path().join("none.obj").to_string_lossy().into_owned()));
    let result = LatentNerfSystem::<TrainBackend>::configure(
        config,
        Registry::with_builtins(),
        dir.path(),
        &Default::default(),
    );
    assert!(result.is_err());
}

// =============================================================================
// Checkpoint filtering
// =============================================================================

#[test]
fn test_checkpoint_filter_synthetic_state() {
    let dir = TempDir::new().unwrap();
    let system = configure(tiny_config(), dir.path());

    let blob = TensorBlob::new(vec![1, 1], vec![1.0]).unwrap();
    let mut state = StateDict::new();
    for name in ["geometry.w", "guidance.w", "prompt_processor.w", "guidance_extra.w"] {
        state.insert(name, blob.clone());
    }
    system.on_save_checkpoint(&mut state);

    let mut kept: Vec<&str> = state.keys().collect();
    kept.sort_unstable();
    assert_eq!(kept, vec!["geometry.w", "guidance_extra.w"]);
}
