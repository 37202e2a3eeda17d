//! Marching tetrahedra over a lattice-sampled scalar field.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::field::ScalarField;
use crate::types::Point3;

use super::tables::{CORNER_OFFSETS, CUBE_TETRAHEDRA};

/// Which side of the level counts as the inside of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inside {
    /// Values greater than the level are inside (densities).
    Above,
    /// Values smaller than the level are inside (signed distances).
    Below,
}

impl Inside {
    #[inline]
    fn contains(self, value: f32, level: f32) -> bool {
        match self {
            Inside::Above => value > level,
            Inside::Below => value < level,
        }
    }
}

/// Triangle mesh produced by isosurface extraction.
///
/// Triangles are wound counter-clockwise when seen from outside, so face normals
/// point away from the inside region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Vertex indices, three per triangle.
    pub triangles: Vec<[u32; 3]>,
}

impl IsoMesh {
    /// True when no surface crossed the field.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Interpolate the position where the field crosses `level` along an edge.
///
/// # Arguments
/// * `p0` - Position of the first lattice point
/// * `p1` - Position of the second lattice point
/// * `v0` - Field value at the first lattice point
/// * `v1` - Field value at the second lattice point
/// * `level` - The iso-value
#[inline]
pub fn interpolate_vertex(p0: Point3, p1: Point3, v0: f32, v1: f32, level: f32) -> Point3 {
    let denom = v1 - v0;
    if libm::fabsf(denom) < 1e-10 {
        return p0.lerp(p1, 0.5);
    }

    let t = ((level - v0) / denom).clamp(0.0, 1.0);
    p0.lerp(p1, t)
}

/// Shared-vertex builder keyed on the lattice edge a vertex lies on.
struct MeshBuilder {
    mesh: IsoMesh,
    edge_vertices: BTreeMap<(usize, usize), u32>,
}

impl MeshBuilder {
    fn new() -> Self {
        Self {
            mesh: IsoMesh::default(),
            edge_vertices: BTreeMap::new(),
        }
    }

    fn edge_vertex(&mut self, a: &Corner, b: &Corner, level: f32) -> u32 {
        // Order endpoints by id so both neighbours interpolate identically.
        let (lo, hi) = if a.id < b.id { (a, b) } else { (b, a) };
        let vertices = &mut self.mesh.vertices;
        *self.edge_vertices.entry((lo.id, hi.id)).or_insert_with(|| {
            vertices.push(interpolate_vertex(lo.pos, hi.pos, lo.value, hi.value, level));
            (vertices.len() - 1) as u32
        })
    }

    fn push_triangle(&mut self, mut tri: [u32; 3], inside_center: Point3) {
        let v = &self.mesh.vertices;
        let (a, b, c) = (v[tri[0] as usize], v[tri[1] as usize], v[tri[2] as usize]);
        let normal = (b - a).cross(c - a);
        let centroid = (a + b + c) / 3.0;
        if normal.dot(inside_center - centroid) > 0.0 {
            tri.swap(1, 2);
        }
        self.mesh.triangles.push(tri);
    }
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    id: usize,
    pos: Point3,
    value: f32,
}

/// Extract the `level` isosurface of a field.
///
/// # Arguments
/// * `field` - The lattice-sampled field
/// * `level` - The iso-value the surface passes through
/// * `inside` - Which side of `level` is the solid region
///
/// # Returns
/// A mesh whose vertices are shared between adjacent triangles. The mesh is
/// empty when every sample lies on the same side of `level`.
pub fn extract_isosurface<F: ScalarField + ?Sized>(field: &F, level: f32, inside: Inside) -> IsoMesh {
    let [nx, ny, nz] = field.resolution();
    let mut builder = MeshBuilder::new();
    if nx < 2 || ny < 2 || nz < 2 {
        return builder.mesh;
    }

    let mut corners = [Corner {
        id: 0,
        pos: Point3::ZERO,
        value: 0.0,
    }; 8];

    for iz in 0..nz - 1 {
        for iy in 0..ny - 1 {
            for ix in 0..nx - 1 {
                let mut inside_mask = 0u8;
                for (i, &(dx, dy, dz)) in CORNER_OFFSETS.iter().enumerate() {
                    let (x, y, z) = (ix + dx, iy + dy, iz + dz);
                    let value = field.value(x, y, z);
                    corners[i] = Corner {
                        id: x + nx * (y + ny * z),
                        pos: field.position(x, y, z),
                        value,
                    };
                    if inside.contains(value, level) {
                        inside_mask |= 1 << i;
                    }
                }

                // Entirely inside or outside: nothing to emit.
                if inside_mask == 0 || inside_mask == 0xff {
                    continue;
                }

                for tet in CUBE_TETRAHEDRA.iter() {
                    process_tetrahedron(&mut builder, &corners, tet, inside_mask, level);
                }
            }
        }
    }

    builder.mesh
}

fn process_tetrahedron(
    builder: &mut MeshBuilder,
    corners: &[Corner; 8],
    tet: &[usize; 4],
    inside_mask: u8,
    level: f32,
) {
    let mut ins: Vec<&Corner> = Vec::with_capacity(4);
    let mut outs: Vec<&Corner> = Vec::with_capacity(4);
    for &c in tet {
        if inside_mask & (1 << c) != 0 {
            ins.push(&corners[c]);
        } else {
            outs.push(&corners[c]);
        }
    }

    let mut inside_center = Point3::ZERO;
    for c in ins.iter() {
        inside_center += c.pos;
    }

    match ins.len() {
        1 | 3 => {
            // One corner separated from the other three.
            let (apex, others) = if ins.len() == 1 { (ins[0], &outs) } else { (outs[0], &ins) };
            let tri = [
                builder.edge_vertex(apex, others[0], level),
                builder.edge_vertex(apex, others[1], level),
                builder.edge_vertex(apex, others[2], level),
            ];
            builder.push_triangle(tri, inside_center / ins.len() as f32);
        }
        2 => {
            let (a, b) = (ins[0], ins[1]);
            let (c, d) = (outs[0], outs[1]);
            let ac = builder.edge_vertex(a, c, level);
            let ad = builder.edge_vertex(a, d, level);
            let bd = builder.edge_vertex(b, d, level);
            let bc = builder.edge_vertex(b, c, level);
            let center = inside_center / 2.0;
            builder.push_triangle([ac, ad, bd], center);
            builder.push_triangle([ac, bd, bc], center);
        }
        _ => {}
    }
}
