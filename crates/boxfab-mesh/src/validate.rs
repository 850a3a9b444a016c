//! Data validation for meshes coming from files or callers.

use crate::Mesh;
use crate::error::{MeshError, MeshResult};

/// Counts gathered while checking a mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshDataReport {
    pub vertex_count: usize,
    pub face_count: usize,
    /// Faces whose three corners are collinear or coincide.
    pub degenerate_faces: usize,
}

/// Check that every face index is in range and every coordinate is finite.
///
/// Returns the first offending vertex or face as an error.
pub fn validate_mesh_data(mesh: &Mesh) -> MeshResult<MeshDataReport> {
    for (vertex_index, v) in mesh.vertices.iter().enumerate() {
        if let Some(axis) = (0..3).find(|&a| !v.position[a].is_finite()) {
            return Err(MeshError::NonFinite {
                vertex: vertex_index,
                axis,
                value: v.position[axis],
            });
        }
    }

    let vertex_count = mesh.vertex_count();
    for (face_index, face) in mesh.faces.iter().enumerate() {
        if let Some(&vertex) = face.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                face: face_index,
                vertex,
                vertex_count,
            });
        }
    }

    let degenerate_faces = mesh.triangles().filter(|t| t.normal().is_none()).count();

    Ok(MeshDataReport {
        vertex_count,
        face_count: mesh.face_count(),
        degenerate_faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    fn single_triangle() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn test_valid_mesh() {
        let report = validate_mesh_data(&single_triangle()).unwrap();
        assert_eq!(report.face_count, 1);
        assert_eq!(report.degenerate_faces, 0);
    }

    #[test]
    fn test_rejects_nan_coordinate() {
        let mut mesh = single_triangle();
        mesh.vertices[1].position.y = f64::NAN;
        let err = validate_mesh_data(&mesh).unwrap_err();
        assert!(matches!(
            err,
            MeshError::NonFinite {
                vertex: 1,
                axis: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mut mesh = single_triangle();
        mesh.faces.push([0, 1, 7]);
        let err = validate_mesh_data(&mesh).unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange {
                face: 1,
                vertex: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_counts_degenerate_faces() {
        let mut mesh = single_triangle();
        mesh.faces.push([0, 0, 1]);
        assert_eq!(validate_mesh_data(&mesh).unwrap().degenerate_faces, 1);
    }
}
