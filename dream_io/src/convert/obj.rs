//! OBJ export for extracted surfaces.
//!
//! Writes a [`Mesh`] as a standard Wavefront OBJ file with shared vertices.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::mesh::Mesh;

/// Mesh statistics returned by export functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshStats {
    /// Number of vertices in the mesh.
    pub vertex_count: usize,
    /// Number of triangles in the mesh.
    pub triangle_count: usize,
}

/// Export a mesh as OBJ.
///
/// # Example
///
/// ```ignore
/// use dream_io::{export_obj, Mesh};
/// use std::fs::File;
///
/// let mut file = File::create("mesh.obj")?;
/// let stats = export_obj(&mesh, &mut file)?;
/// ```
pub fn export_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> Result<MeshStats> {
    writeln!(writer, "# dream OBJ export")?;
    writeln!(writer, "# {} vertices", mesh.vertex_count())?;
    for v in &mesh.v_pos {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }

    writeln!(writer)?;

    // OBJ indices are 1-based.
    writeln!(writer, "# {} faces", mesh.triangle_count())?;
    for [a, b, c] in &mesh.t_pos_idx {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }

    Ok(MeshStats {
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
    })
}

/// Export a mesh to an OBJ file, creating parent directories as needed.
pub fn export_obj_to_file<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<MeshStats> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    let stats = export_obj(mesh, &mut writer)?;
    writer.flush()?;
    log::info!(
        "Exported mesh with {} vertices and {} triangles to {}",
        stats.vertex_count,
        stats.triangle_count,
        path.display()
    );
    Ok(stats)
}
