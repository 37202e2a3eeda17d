//! dream_io - mesh, image, animation and checkpoint I/O.
//!
//! This crate provides the file boundary of the text-to-3D pipeline. It knows
//! nothing about tensors: renders arrive as flat float images, surfaces as
//! [`Mesh`] values and parameters as [`StateDict`] blobs.
//!
//! # Core Types
//!
//! - [`Mesh`]: Shared-vertex triangle mesh (`v_pos`, `t_pos_idx`)
//! - [`SignedDistanceMesh`]: Mesh prepared for inside/outside queries
//! - [`GridItem`]: One panel of an exported image grid
//! - [`StateDict`]: Ordered map of named tensor blobs
//!
//! # Example
//!
//! ```ignore
//! use dream_io::{save_image_grid, GridItem, ImageData};
//!
//! let rgb = ImageData::new(64, 64, 3, pixels)?;
//! let opacity = ImageData::new(64, 64, 1, alpha)?;
//! save_image_grid("it100-0.png", &[GridItem::rgb(rgb), GridItem::grayscale(opacity)])?;
//! ```

pub mod convert;
pub mod error;
pub mod format;
pub mod image_grid;
pub mod mesh;
pub mod video;

// Re-export core types from dream_core
pub use dream_core::{IsoMesh, Point3};

pub use error::{DreamIoError, Result};
pub use mesh::Mesh;

pub use convert::{
    export_obj, export_obj_to_file, parse_obj, parse_obj_file, MeshStats, SignedDistanceMesh,
};
pub use format::{
    load_from_file, load_state_dict, save_state_dict, save_to_file, StateDict, StateDictHeader,
    TensorBlob, STATE_DICT_MAGIC,
};
pub use image_grid::{compose_image_grid, save_image_grid, Colormap, GridItem, ImageData};
pub use video::{numbered_frames, save_img_sequence};
