//! Format conversion utilities.
//!
//! This module provides OBJ import and export for [`Mesh`](crate::mesh::Mesh).

pub mod obj;
pub mod obj_import;

pub use obj::{export_obj, export_obj_to_file, MeshStats};
pub use obj_import::{parse_obj, parse_obj_file, SignedDistanceMesh};
