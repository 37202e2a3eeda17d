//! Explicit triangle meshes.
//!
//! [`Mesh`] is the exchange type between isosurface extraction, the OBJ
//! exporter and the shape prior. Field names follow the usual `v_pos` /
//! `t_pos_idx` convention of mesh exporters.

use dream_core::{IsoMesh, Point3};

/// Triangle mesh with shared vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions.
    pub v_pos: Vec<Point3>,
    /// Vertex indices, three per triangle, counter-clockwise seen from outside.
    pub t_pos_idx: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a mesh from vertices and triangles.
    pub fn new(v_pos: Vec<Point3>, t_pos_idx: Vec<[u32; 3]>) -> Self {
        Self { v_pos, t_pos_idx }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.v_pos.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.t_pos_idx.len()
    }

    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.t_pos_idx.is_empty()
    }

    /// The three corners of a triangle.
    #[inline]
    pub fn triangle(&self, index: usize) -> [Point3; 3] {
        let [a, b, c] = self.t_pos_idx[index];
        [
            self.v_pos[a as usize],
            self.v_pos[b as usize],
            self.v_pos[c as usize],
        ]
    }

    /// Compute the axis-aligned bounding box.
    pub fn bounding_box(&self) -> (Point3, Point3) {
        if self.v_pos.is_empty() {
            return (Point3::ZERO, Point3::ZERO);
        }

        let mut min = self.v_pos[0];
        let mut max = self.v_pos[0];
        for v in &self.v_pos {
            min = min.min(*v);
            max = max.max(*v);
        }

        (min, max)
    }

    /// Unit face normal of a triangle.
    fn face_normal(&self, index: usize) -> Point3 {
        let [a, b, c] = self.triangle(index);
        (b - a).cross(c - a).normalize()
    }

    /// Vertex normals as the average of adjacent face normals.
    pub fn vertex_normals(&self) -> Vec<Point3> {
        let mut normals = vec![Point3::ZERO; self.v_pos.len()];
        for (index, tri) in self.t_pos_idx.iter().enumerate() {
            let n = self.face_normal(index);
            for &i in tri {
                normals[i as usize] += n;
            }
        }
        normals.into_iter().map(Point3::normalize).collect()
    }

    /// Recentre on the bounding-box centre and scale so the farthest vertex
    /// sits at `max_radius` from the origin.
    pub fn normalized(&self, max_radius: f32) -> Self {
        let (min, max) = self.bounding_box();
        let center = (min + max) * 0.5;
        let radius = self
            .v_pos
            .iter()
            .map(|v| (*v - center).length())
            .fold(0.0f32, f32::max);
        let scale = if radius > 0.0 { max_radius / radius } else { 1.0 };

        Self {
            v_pos: self.v_pos.iter().map(|v| (*v - center) * scale).collect(),
            t_pos_idx: self.t_pos_idx.clone(),
        }
    }
}

impl From<IsoMesh> for Mesh {
    fn from(mesh: IsoMesh) -> Self {
        Self {
            v_pos: mesh.vertices,
            t_pos_idx: mesh.triangles,
        }
    }
}
