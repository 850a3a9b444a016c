//! Mesh preparation and initial boxes.

use boxfab_mesh::Mesh;
use nalgebra::{Matrix3, Rotation3, Vector3};
use tracing::debug;

use crate::box3d::Box3D;
use crate::box_list::BoxList;
use crate::direction::Direction;
use crate::error::{FieldError, FieldResult};

/// Margin added around a face's vertex bounds when seeding its box.
pub const SEED_MARGIN: f64 = 1.0;

/// Rotation applied to the mesh for orientation `index`.
///
/// Orientation 0 is the mesh as given. The others tilt it by 45 degrees
/// so faces near a diagonal get a turn at being axis-aligned.
pub fn orientation_rotation(index: usize) -> Matrix3<f64> {
    let quarter = std::f64::consts::FRAC_PI_4;
    let rot = match index {
        1 => Rotation3::from_axis_angle(&Vector3::z_axis(), quarter),
        2 => Rotation3::from_axis_angle(&Vector3::x_axis(), quarter),
        3 => Rotation3::from_axis_angle(&Vector3::y_axis(), quarter),
        4 => Rotation3::from_axis_angle(&Vector3::z_axis(), -quarter),
        5 => Rotation3::from_axis_angle(&Vector3::x_axis(), -quarter),
        _ => Rotation3::identity(),
    };
    *rot.matrix()
}

/// Target direction of orientation `index`.
pub fn orientation_target(index: usize) -> Direction {
    Direction::ALL[index % Direction::ALL.len()]
}

/// Center the mesh on the origin and scale it uniformly so its largest
/// extent spans `2 * resolution` grid units. Returns the scale factor.
pub fn scale_to_resolution(mesh: &mut Mesh, resolution: u32) -> FieldResult<f64> {
    let (lo, hi) = mesh.bounds().ok_or_else(|| FieldError::EmptyMesh {
        details: "cannot scale a mesh without vertices".into(),
    })?;
    let extent = (hi - lo).max();
    if !(extent.is_finite() && extent > 0.0) {
        return Err(FieldError::EmptyMesh {
            details: format!("mesh extent is {extent}"),
        });
    }
    let center = nalgebra::center(&lo, &hi);
    mesh.translate(-center.coords);
    let factor = 2.0 * f64::from(resolution) / extent;
    mesh.scale(factor);
    Ok(factor)
}

/// One box per non-degenerate face.
///
/// Each face is assigned the canonical direction closest to its normal. With
/// `restrict` set, faces assigned to another direction are skipped. The box
/// spans the face's vertex bounds widened by [`SEED_MARGIN`], holds the
/// three vertices as constraints, and carries `rotation`.
pub fn seed_boxes(mesh: &Mesh, rotation: &Matrix3<f64>, restrict: Option<Direction>) -> FieldResult<BoxList> {
    let mut boxes = BoxList::new();
    let mut degenerate = 0usize;
    for tri in mesh.triangles() {
        let Some(normal) = tri.normal() else {
            degenerate += 1;
            continue;
        };
        let direction = Direction::closest(&normal);
        if restrict.is_some_and(|r| r != direction) {
            continue;
        }
        let (lo, hi) = tri.bounds();
        let margin = Vector3::repeat(SEED_MARGIN);
        let b = Box3D::new(lo - margin, hi + margin)?
            .with_target(direction)
            .with_rotation(*rotation)
            .with_constraints(tri.vertices());
        boxes.push(b);
    }
    debug!(
        faces = mesh.face_count(),
        seeded = boxes.len(),
        degenerate,
        "Seeded boxes"
    );
    Ok(boxes)
}
