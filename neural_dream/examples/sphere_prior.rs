//! Example: Optimizing a latent scene against a guide shape.
//!
//! This example demonstrates the full workflow on the CPU backend:
//! 1. Extract a sphere mesh from an analytic signed distance field
//! 2. Write it as OBJ and use it as the guide shape
//! 3. Fit the implicit volume with score distillation plus the shape prior
//! 4. Render the test orbit and export the extracted mesh
//!
//! # Usage
//!
//! ```bash
//! cargo run -p neural_dream --example sphere_prior
//! ```
//!
//! Output files are saved to `target/sphere_prior/`.

use std::fs;
use std::process::ExitCode;

use burn::backend::{Autodiff, NdArray};
use serde_json::json;

use dream_core::{extract_isosurface, DenseField, Inside};
use dream_io::export_obj_to_file;
use neural_dream::prelude::*;

type MyBackend = Autodiff<NdArray>;

/// Output directory for generated files.
const OUTPUT_DIR: &str = "target/sphere_prior";

const SPHERE_RADIUS: f32 = 0.5;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    fs::create_dir_all(OUTPUT_DIR)?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("          Latent Scene Optimization with a Shape Prior");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    // =========================================================================
    // Step 1: Build the guide shape
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 1: Extracting Guide Sphere                             │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let field = DenseField::from_fn(
        [24, 24, 24],
        Point3::new(-1.0, -1.0, -1.0),
        Point3::new(1.0, 1.0, 1.0),
        |p| p.length() - SPHERE_RADIUS,
    )?;
    let sphere: Mesh = extract_isosurface(&field, 0.0, Inside::Below).into();
    let guide_path = format!("{OUTPUT_DIR}/guide_sphere.obj");
    let stats = export_obj_to_file(&sphere, &guide_path)?;

    println!("  Radius:          {:.2}", SPHERE_RADIUS);
    println!("  Vertices:        {}", sphere.vertex_count());
    println!("  Triangles:       {}", sphere.triangle_count());
    println!("  Written:         {} ({:?})", guide_path, stats);
    println!();

    // =========================================================================
    // Step 2: Configure the experiment
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 2: Configuring Experiment                              │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let loss = LossWeights::latent_nerf()
        .with("lambda_shape", 1.0)
        .with("lambda_sparsity", WeightSchedule::Linear {
            start_step: 0,
            start_value: 0.0,
            end_value: 0.1,
            end_step: 100,
        });
    let system = SystemConfig::new()
        .with_geometry(json!({"grid_resolution": 16, "isosurface_resolution": 32}))
        .with_renderer(json!({"num_samples_per_ray": 24}))
        .with_prompt_processor(json!({"prompt": "a smooth stone sphere"}))
        .with_guide_shape(Some(guide_path.clone()))
        .with_loss(loss);
    let experiment = ExperimentConfig::new()
        .with_name("sphere_prior".to_string())
        .with_exp_root_dir(OUTPUT_DIR.to_string())
        .with_system(system)
        .with_data(
            CameraConfig::new()
                .with_height(24)
                .with_width(24)
                .with_eval_height(48)
                .with_eval_width(48)
                .with_n_test_views(12),
        )
        .with_trainer(
            TrainerConfig::new()
                .with_max_steps(150)
                .with_val_check_interval(50)
                .with_log_every_n_steps(25)
                .with_checkpoint_every_n_steps(0),
        );

    println!("  Prompt:          a smooth stone sphere");
    println!("  Steps:           {}", experiment.trainer.max_steps);
    println!("  Output:          {}", experiment.output_dir().display());
    println!();

    // =========================================================================
    // Step 3: Fit
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 3: Fitting                                             │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let device = Default::default();
    let mut system = LatentNerfSystem::<MyBackend>::configure(
        experiment.system.clone(),
        Registry::with_builtins(),
        experiment.output_dir(),
        &device,
    )?;
    let mut trainer = Trainer::from_experiment(&experiment, &device)?;
    trainer.fit(&mut system)?;

    println!("  Final loss:      {:.6}", trainer.last_loss());
    println!();

    // =========================================================================
    // Step 4: Test orbit and mesh
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 4: Rendering Test Orbit                                │");
    println!("└─────────────────────────────────────────────────────────────┘");

    trainer.test(&mut system)?;

    let step = trainer.progress().global_step;
    println!("  Video:           it{step}-test.gif");
    println!("  Mesh:            mesh.obj");
    println!();
    println!("Done. Files are in {}", experiment.output_dir().display());
    Ok(())
}
