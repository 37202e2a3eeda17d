//! Command line driver: load an experiment, optimize the scene, export.
//!
//! # Usage
//!
//! ```bash
//! dream --print-config > hamburger.json
//! dream --config hamburger.json --prompt "a delicious hamburger" --max-steps 2000
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use clap::Parser;
use serde_json::Value;

use neural_dream::prelude::*;

type MyBackend = Autodiff<NdArray>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Latent score-distillation text-to-3D", long_about = None)]
struct Args {
    /// Experiment configuration (JSON); defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the text prompt
    #[arg(short, long)]
    prompt: Option<String>,

    /// Override the experiment name
    #[arg(long)]
    name: Option<String>,

    /// Override the output root directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Override the number of optimizer steps
    #[arg(long)]
    max_steps: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Continue from the latest checkpoint in the output directory
    #[arg(long)]
    resume: bool,

    /// Skip the test pass (orbit video and mesh export)
    #[arg(long)]
    skip_test: bool,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let experiment = resolve_config(&args)?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&experiment)?);
        return Ok(());
    }
    experiment
        .validate()
        .map_err(|message| DreamError::InvalidConfig { message })?;

    let device = Default::default();
    let output_dir = experiment.output_dir();
    std::fs::create_dir_all(&output_dir)?;
    experiment.save(output_dir.join("config.json"))?;

    let mut system = LatentNerfSystem::<MyBackend>::configure(
        experiment.system.clone(),
        Registry::with_builtins(),
        &output_dir,
        &device,
    )?;
    let mut trainer = Trainer::from_experiment(&experiment, &device)?;

    if args.resume {
        trainer.resume(&mut system)?;
    }
    trainer.fit(&mut system)?;

    if !args.skip_test {
        trainer.test(&mut system)?;
    }
    log::info!("Outputs written to {}", output_dir.display());
    Ok(())
}

fn resolve_config(args: &Args) -> Result<ExperimentConfig> {
    let mut experiment = match &args.config {
        Some(path) => ExperimentConfig::load(path).map_err(|err| DreamError::InvalidConfig {
            message: format!("{}: {}", path.display(), err),
        })?,
        None => ExperimentConfig::new(),
    };

    if let Some(prompt) = &args.prompt {
        set_option(&mut experiment.system.prompt_processor, "prompt", Value::from(prompt.as_str()))?;
    }
    if let Some(name) = &args.name {
        experiment.name = name.clone();
    }
    if let Some(output) = &args.output {
        experiment.exp_root_dir = output.clone();
    }
    if let Some(max_steps) = args.max_steps {
        experiment.trainer.max_steps = max_steps;
    }
    if let Some(seed) = args.seed {
        experiment.trainer.seed = seed;
        set_option(&mut experiment.system.guidance, "seed", Value::from(seed))?;
    }
    Ok(experiment)
}

fn set_option(options: &mut Value, key: &str, value: Value) -> Result<()> {
    let Some(map) = options.as_object_mut() else {
        return Err(DreamError::InvalidConfig {
            message: format!("cannot set '{key}': component options are not a JSON object"),
        });
    };
    map.insert(key.to_string(), value);
    Ok(())
}
