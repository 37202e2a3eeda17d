//! Checkpoint save/load.
//!
//! A checkpoint is a directory `checkpoint_<step>` holding:
//! - `model.drsd`: the filtered state dict
//! - `metadata.json`: training progress

use std::fs;
use std::path::{Path, PathBuf};

use dream_io::StateDict;
use serde::{Deserialize, Serialize};

use crate::config::Progress;
use crate::error::Result;

const STATE_FILE: &str = "model.drsd";
const METADATA_FILE: &str = "metadata.json";
const CHECKPOINT_PREFIX: &str = "checkpoint_";

/// Checkpoint metadata stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Checkpoint version for compatibility.
    pub version: u32,
    /// Experiment name.
    pub name: String,
    /// Current epoch.
    pub epoch: usize,
    /// Optimizer steps taken.
    pub global_step: usize,
    /// Number of state dict entries.
    pub num_entries: usize,
    /// Most recent total loss.
    pub last_loss: f32,
}

impl CheckpointMetadata {
    /// Metadata for a checkpoint taken at `progress`.
    pub fn new(name: impl Into<String>, progress: Progress) -> Self {
        Self {
            version: 1,
            name: name.into(),
            epoch: progress.epoch,
            global_step: progress.global_step,
            num_entries: 0,
            last_loss: f32::NAN,
        }
    }

    /// Set the most recent loss.
    pub fn with_last_loss(mut self, loss: f32) -> Self {
        self.last_loss = loss;
        self
    }

    /// Training progress at the checkpoint.
    pub fn progress(&self) -> Progress {
        Progress {
            epoch: self.epoch,
            global_step: self.global_step,
        }
    }
}

/// Directory of the checkpoint for `global_step` under `base_dir`.
pub fn checkpoint_dir(base_dir: &Path, global_step: usize) -> PathBuf {
    base_dir.join(format!("{CHECKPOINT_PREFIX}{global_step}"))
}

/// Save a checkpoint to a directory.
pub fn save_checkpoint(dir: &Path, state: &StateDict, metadata: &CheckpointMetadata) -> Result<()> {
    fs::create_dir_all(dir)?;

    dream_io::save_to_file(state, dir.join(STATE_FILE))?;

    let metadata = CheckpointMetadata {
        num_entries: state.len(),
        ..metadata.clone()
    };
    let json = serde_json::to_string_pretty(&metadata)?;
    fs::write(dir.join(METADATA_FILE), json)?;

    log::info!(
        "Saved checkpoint to {} (step {}, {} tensors)",
        dir.display(),
        metadata.global_step,
        state.len()
    );
    Ok(())
}

/// Load a checkpoint from a directory.
pub fn load_checkpoint(dir: &Path) -> Result<(StateDict, CheckpointMetadata)> {
    let json = fs::read_to_string(dir.join(METADATA_FILE))?;
    let metadata: CheckpointMetadata = serde_json::from_str(&json)?;
    let state = dream_io::load_from_file(dir.join(STATE_FILE))?;

    log::info!(
        "Loaded checkpoint from {} (step {}, {} tensors)",
        dir.display(),
        metadata.global_step,
        state.len()
    );
    Ok((state, metadata))
}

/// Check if a checkpoint exists at the given path.
pub fn checkpoint_exists(dir: &Path) -> bool {
    dir.join(METADATA_FILE).is_file() && dir.join(STATE_FILE).is_file()
}

/// Latest `checkpoint_<step>` directory under `base_dir`.
pub fn find_latest_checkpoint(base_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(base_dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| checkpoint_exists(path))
        .filter_map(|path| {
            let step = path
                .file_name()?
                .to_str()?
                .strip_prefix(CHECKPOINT_PREFIX)?
                .parse::<usize>()
                .ok()?;
            Some((step, path))
        })
        .max_by_key(|(step, _)| *step)
        .map(|(_, path)| path)
}
