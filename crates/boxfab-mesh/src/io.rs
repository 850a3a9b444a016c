//! Mesh file I/O for STL and OBJ.
//!
//! OBJ is the interchange format handed to field samplers, so the OBJ writer
//! keeps the indexed structure and writes full-precision coordinates.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::log_mesh_stats;
use crate::validate::validate_mesh_data;
use crate::{Mesh, Vertex};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "obj" => Some(MeshFormat::Obj),
                _ => None,
            })
    }

    fn of(path: &Path) -> MeshResult<Self> {
        Self::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

/// Load a mesh from file, auto-detecting the format from the extension.
///
/// The result is checked for out-of-range indices and non-finite coordinates.
pub fn load_mesh(path: &Path) -> MeshResult<Mesh> {
    let format = MeshFormat::of(path)?;
    info!(path = %path.display(), format = ?format, "Loading mesh");

    let mesh = match format {
        MeshFormat::Stl => load_stl(path)?,
        MeshFormat::Obj => load_obj(path)?,
    };

    if mesh.is_empty() {
        return Err(MeshError::empty("mesh has no vertices or faces"));
    }
    let report = validate_mesh_data(&mesh)?;
    if report.degenerate_faces > 0 {
        debug!(count = report.degenerate_faces, "Mesh has degenerate faces");
    }

    log_mesh_stats(&mesh, "load");
    if let Some((min, max)) = mesh.bounds() {
        if (max - min).max() <= f64::EPSILON {
            warn!(path = %path.display(), "Mesh has zero extent");
        }
    }

    Ok(mesh)
}

fn load_stl(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::read(path, e))?;
    let mut reader = BufReader::new(file);

    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| MeshError::parse(path, e.to_string()))?;

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    mesh.vertices.extend(
        stl.vertices
            .iter()
            .map(|v| Vertex::from_coords(v.0[0] as f64, v.0[1] as f64, v.0[2] as f64)),
    );
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        // STL soups often carry collapsed triangles.
        if a != b && b != c && a != c {
            mesh.faces.push([a as u32, b as u32, c as u32]);
        }
    }

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "STL converted"
    );
    Ok(mesh)
}

fn load_obj(path: &Path) -> MeshResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| MeshError::parse(path, e.to_string()))?;

    if models.is_empty() {
        return Err(MeshError::empty("OBJ file contains no models"));
    }

    let mut mesh = Mesh::new();
    for model in &models {
        let offset = mesh.vertices.len() as u32;
        let obj = &model.mesh;

        for p in obj.positions.chunks_exact(3) {
            mesh.vertices
                .push(Vertex::from_coords(p[0] as f64, p[1] as f64, p[2] as f64));
        }
        for f in obj.indices.chunks_exact(3) {
            mesh.faces.push([f[0] + offset, f[1] + offset, f[2] + offset]);
        }
    }

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        models = models.len(),
        "OBJ loaded"
    );
    Ok(mesh)
}

/// Save a mesh, choosing the format from the extension.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    match MeshFormat::of(path)? {
        MeshFormat::Stl => save_stl(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
    }
}

/// Save a mesh as binary STL.
pub fn save_stl(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let io_err = |e| MeshError::write(path, e);

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let to_stl =
        |p: &nalgebra::Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<stl_io::Triangle> = mesh
        .triangles()
        .map(|tri| {
            let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [to_stl(&tri.v0), to_stl(&tri.v1), to_stl(&tri.v2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    info!(path = %path.display(), triangles = triangles.len(), "Saved STL");
    Ok(())
}

/// Save a mesh as ASCII OBJ with one-based indices.
pub fn save_obj(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let io_err = |e| MeshError::write(path, e);

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved OBJ"
    );
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, w: &mut W) -> std::io::Result<()> {
    writeln!(w, "# vertices: {}", mesh.vertex_count())?;
    writeln!(w, "# faces: {}", mesh.face_count())?;
    for v in &mesh.vertices {
        let p = v.position;
        writeln!(w, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(w, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

impl Mesh {
    /// Load a mesh from an STL or OBJ file.
    pub fn load(path: impl AsRef<Path>) -> MeshResult<Self> {
        load_mesh(path.as_ref())
    }

    /// Save the mesh as STL or OBJ, by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> MeshResult<()> {
        save_mesh(self, path.as_ref())
    }
}
