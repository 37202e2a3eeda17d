//! State-dict file format support.
//!
//! Checkpoints store the optimizable scene tensors as a flat, name-sorted list
//! of `f32` blobs behind a small header.
//!
//! # Example
//!
//! ```ignore
//! use dream_io::{save_to_file, load_from_file, StateDict, TensorBlob};
//!
//! let mut state = StateDict::new();
//! state.insert("geometry.grid", TensorBlob::new(vec![2], vec![0.0, 1.0])?);
//! save_to_file(&state, "model.drsd")?;
//! let loaded = load_from_file("model.drsd")?;
//! ```

pub mod header;
pub mod state_dict;

pub use header::{StateDictHeader, HEADER_SIZE, STATE_DICT_MAGIC, STATE_DICT_VERSION};
pub use state_dict::{
    load_from_file, load_state_dict, save_state_dict, save_to_file, StateDict, TensorBlob,
};
