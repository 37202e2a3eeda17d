//! OBJ import and signed distance queries.
//!
//! Parses Wavefront OBJ files and answers signed distance queries against the
//! resulting mesh by brute force over all triangles.
//!
//! # Sign
//!
//! The sign comes from the pseudo-normal at the closest point: vertex normals
//! (averaged face normals) blended with the barycentric weights of the hit.
//! Points on the side the normal points to are outside (positive).

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use dream_core::{closest_point_on_triangle, Point3};
use rayon::prelude::*;

use crate::error::{DreamIoError, Result};
use crate::mesh::Mesh;

/// Parse an OBJ file from a reader.
///
/// Only `v` and `f` records are read; polygons are fan-triangulated and
/// `v/vt/vn` index forms as well as negative (relative) indices are accepted.
pub fn parse_obj<R: Read>(reader: R) -> Result<Mesh> {
    let mut v_pos = Vec::new();
    let mut t_pos_idx = Vec::new();

    for (line_no, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let mut coord = [0.0f32; 3];
                for c in coord.iter_mut() {
                    *c = parts
                        .next()
                        .ok_or_else(|| {
                            DreamIoError::invalid_format(format!("line {}: missing vertex coordinate", line_no + 1))
                        })?
                        .parse()
                        .map_err(|_| {
                            DreamIoError::invalid_format(format!("line {}: invalid vertex coordinate", line_no + 1))
                        })?;
                }
                v_pos.push(Point3::from(coord));
            }
            Some("f") => {
                let mut face: Vec<u32> = Vec::new();
                for part in parts {
                    let idx_str = part.split('/').next().unwrap_or(part);
                    let idx: i64 = idx_str.parse().map_err(|_| {
                        DreamIoError::invalid_format(format!("line {}: invalid face index {}", line_no + 1, idx_str))
                    })?;
                    let resolved = if idx > 0 {
                        idx - 1
                    } else {
                        v_pos.len() as i64 + idx
                    };
                    if resolved < 0 || resolved >= v_pos.len() as i64 {
                        return Err(DreamIoError::invalid_format(format!(
                            "line {}: face index {} out of range",
                            line_no + 1,
                            idx
                        )));
                    }
                    face.push(resolved as u32);
                }

                if face.len() >= 3 {
                    for i in 1..face.len() - 1 {
                        t_pos_idx.push([face[0], face[i], face[i + 1]]);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(Mesh::new(v_pos, t_pos_idx))
}

/// Parse an OBJ file from a path.
pub fn parse_obj_file<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let file = std::fs::File::open(path)?;
    parse_obj(file)
}

/// A mesh prepared for signed distance queries.
#[derive(Debug, Clone)]
pub struct SignedDistanceMesh {
    mesh: Mesh,
    vertex_normals: Vec<Point3>,
}

impl SignedDistanceMesh {
    /// Precompute vertex normals for `mesh`.
    pub fn new(mesh: Mesh) -> Self {
        let vertex_normals = mesh.vertex_normals();
        Self {
            mesh,
            vertex_normals,
        }
    }

    /// The underlying mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Signed distance from a point to the mesh, negative inside.
    ///
    /// Returns `f32::MAX` for a mesh without triangles.
    pub fn signed_distance(&self, point: Point3) -> f32 {
        if self.mesh.is_empty() {
            return f32::MAX;
        }

        let mut min_dist_sq = f32::MAX;
        let mut closest_point = point;
        let mut closest_normal = Point3::new(0.0, 0.0, 1.0);

        for (index, &[i0, i1, i2]) in self.mesh.t_pos_idx.iter().enumerate() {
            let [a, b, c] = self.mesh.triangle(index);
            let hit = closest_point_on_triangle(point, a, b, c);
            let dist_sq = (point - hit.point).length_squared();

            if dist_sq < min_dist_sq {
                min_dist_sq = dist_sq;
                closest_point = hit.point;
                closest_normal = hit.blend(
                    self.vertex_normals[i0 as usize],
                    self.vertex_normals[i1 as usize],
                    self.vertex_normals[i2 as usize],
                );
            }
        }

        let dist = min_dist_sq.sqrt();
        if (point - closest_point).dot(closest_normal) >= 0.0 {
            dist
        } else {
            -dist
        }
    }

    /// Signed distances for many points, evaluated in parallel.
    pub fn signed_distances(&self, points: &[Point3]) -> Vec<f32> {
        points.par_iter().map(|&p| self.signed_distance(p)).collect()
    }

    /// Inside test by signed distance.
    pub fn contains(&self, point: Point3) -> bool {
        self.signed_distance(point) < 0.0
    }
}
