//! Isosurface extraction.
//!
//! Turns a [`ScalarField`](crate::field::ScalarField) into a shared-vertex
//! triangle mesh using marching tetrahedra. Each lattice cell is split into six
//! tetrahedra; the surface inside a tetrahedron is the plane where the linearly
//! interpolated field crosses the level, giving one or two triangles.
//!
//! # Example
//!
//! ```ignore
//! use dream_core::isosurface::{extract_isosurface, Inside};
//!
//! // Density field: the object is where the value exceeds the threshold.
//! let mesh = extract_isosurface(&field, 25.0, Inside::Above);
//! ```

mod algorithm;
mod tables;

pub use algorithm::{extract_isosurface, interpolate_vertex, Inside, IsoMesh};
pub use tables::{CORNER_OFFSETS, CUBE_TETRAHEDRA};
