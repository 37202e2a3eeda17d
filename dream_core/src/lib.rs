//! # dream_core
//!
//! Pure geometry for the latent text-to-3D pipeline.
//!
//! This crate holds the math that the training crate (`neural_dream`) and the
//! I/O crate (`dream_io`) share, without touching tensors or files.
//!
//! ## Features
//!
//! - **no_std compatible**: Only `alloc` is required; `std` adds `Error` impls
//! - **Dense scalar fields**: Lattice-sampled density fields with world-space bounds
//! - **Isosurface extraction**: Marching tetrahedra with shared-vertex output
//! - **Triangle queries**: Closest point on a triangle with barycentrics
//! - **Text hashing**: FNV-1a for the feature-hashing prompt encoder
//!
//! ## Modules
//!
//! - [`types`]: `Point3` and its arithmetic
//! - [`field`]: The `ScalarField` trait and the `DenseField` lattice
//! - [`isosurface`]: Surface extraction from a `ScalarField`
//! - [`triangle`]: Point-triangle queries
//! - [`hash`]: FNV-1a hashing of byte strings
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```ignore
//! use dream_core::prelude::*;
//!
//! let field = DenseField::from_fn([32, 32, 32], Point3::splat(-1.0), Point3::splat(1.0), |p| {
//!     0.5 - p.length()
//! })?;
//! let mesh = extract_isosurface(&field, 0.0, Inside::Above);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod field;
pub mod hash;
pub mod isosurface;
pub mod triangle;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::DreamCoreError;
    pub use crate::field::{DenseField, ScalarField};
    pub use crate::hash::fnv1a_64;
    pub use crate::isosurface::{extract_isosurface, Inside, IsoMesh};
    pub use crate::triangle::{closest_point_on_triangle, TrianglePoint};
    pub use crate::types::Point3;
}

pub use error::DreamCoreError;
pub use field::{DenseField, ScalarField};
pub use hash::fnv1a_64;
pub use isosurface::{extract_isosurface, Inside, IsoMesh};
pub use triangle::{closest_point_on_triangle, TrianglePoint};
pub use types::Point3;
