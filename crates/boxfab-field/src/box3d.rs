//! Axis-extent boxes with a target direction and anchor points.

use std::io::{self, Read, Write};

use nalgebra::{Matrix3, Point3, Vector3, Vector6};

use crate::codec::{read_bytes, read_f64x3, write_f64s};
use crate::direction::{Axis, Color, Direction};
use crate::error::{FieldError, FieldResult};

/// Size of one serialized box: 27 doubles and an RGBA color.
pub const BOX_RECORD_BYTES: usize = 27 * 8 + 4;

/// A box `[min, max]` with `min < max` on every axis.
///
/// Every mutating call validates the result and leaves the box untouched
/// when it would become degenerate or non-finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Box3D {
    min: Point3<f64>,
    max: Point3<f64>,
    target: Direction,
    constraints: [Option<Point3<f64>>; 3],
    rotation: Matrix3<f64>,
    color: Color,
}

fn check_bounds(min: &Point3<f64>, max: &Point3<f64>) -> FieldResult<()> {
    if !(min.coords.iter().chain(max.coords.iter()).all(|v| v.is_finite())) {
        return Err(FieldError::geometry(format!(
            "non-finite bounds {min:?} .. {max:?}"
        )));
    }
    for axis in Axis::ALL {
        let a = axis.index();
        if min[a] >= max[a] {
            return Err(FieldError::geometry(format!(
                "min.{axis:?} = {} is not below max.{axis:?} = {}",
                min[a], max[a]
            )));
        }
    }
    Ok(())
}

fn slot(k: usize) -> FieldResult<usize> {
    match k {
        1..=3 => Ok(k - 1),
        _ => Err(FieldError::InvalidConstraintIndex { index: k }),
    }
}

impl Box3D {
    /// Create a box targeting +X with no constraints and identity rotation.
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> FieldResult<Self> {
        check_bounds(&min, &max)?;
        Ok(Self {
            min,
            max,
            target: Direction::PosX,
            constraints: [None; 3],
            rotation: Matrix3::identity(),
            color: Direction::PosX.color(),
        })
    }

    /// Create a box from `(min.x, min.y, min.z, max.x, max.y, max.z)`.
    pub fn from_coordinates(c: &Vector6<f64>) -> FieldResult<Self> {
        Self::new(
            Point3::new(c[0], c[1], c[2]),
            Point3::new(c[3], c[4], c[5]),
        )
    }

    /// Set the target and the matching color.
    pub fn with_target(mut self, target: Direction) -> Self {
        self.target = target;
        self.color = target.color();
        self
    }

    pub fn with_rotation(mut self, rotation: Matrix3<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_constraints(mut self, points: [Point3<f64>; 3]) -> Self {
        self.constraints = points.map(Some);
        self
    }

    #[inline]
    pub fn min(&self) -> Point3<f64> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3<f64> {
        self.max
    }

    #[inline]
    pub fn target(&self) -> Direction {
        self.target
    }

    pub fn set_target(&mut self, target: Direction) {
        self.target = target;
    }

    #[inline]
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Matrix3<f64>) {
        self.rotation = rotation;
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// The six coordinates `(min.x, min.y, min.z, max.x, max.y, max.z)`.
    pub fn coordinates(&self) -> Vector6<f64> {
        Vector6::new(
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        )
    }

    /// A copy with new coordinates and the same metadata.
    pub fn with_coordinates(&self, c: &Vector6<f64>) -> FieldResult<Self> {
        let min = Point3::new(c[0], c[1], c[2]);
        let max = Point3::new(c[3], c[4], c[5]);
        check_bounds(&min, &max)?;
        Ok(Self {
            min,
            max,
            ..self.clone()
        })
    }

    pub fn set_bounds(&mut self, min: Point3<f64>, max: Point3<f64>) -> FieldResult<()> {
        check_bounds(&min, &max)?;
        self.min = min;
        self.max = max;
        Ok(())
    }

    pub fn set_min(&mut self, min: Point3<f64>) -> FieldResult<()> {
        self.set_bounds(min, self.max)
    }

    pub fn set_max(&mut self, max: Point3<f64>) -> FieldResult<()> {
        self.set_bounds(self.min, max)
    }

    /// Translate the whole box along one axis.
    pub fn move_along_axis(&mut self, axis: Axis, delta: f64) -> FieldResult<()> {
        let mut offset = Vector3::zeros();
        offset[axis.index()] = delta;
        self.set_bounds(self.min + offset, self.max + offset)
    }

    /// Index in [`Box3D::coordinates`] of the boundary facing `face`.
    #[inline]
    pub fn coordinate_index(face: Direction) -> usize {
        let a = face.axis().index();
        if face.sign() > 0.0 { 3 + a } else { a }
    }

    /// Coordinate of the boundary whose outward normal is `face`.
    pub fn face_coordinate(&self, face: Direction) -> f64 {
        self.coordinates()[Self::coordinate_index(face)]
    }

    /// Move one boundary along its outward normal; positive `delta` grows the box.
    pub fn move_boundary(&mut self, face: Direction, delta: f64) -> FieldResult<()> {
        let mut c = self.coordinates();
        c[Self::coordinate_index(face)] += face.sign() * delta;
        let moved = self.with_coordinates(&c)?;
        *self = moved;
        Ok(())
    }

    /// Resize along `axis` to `length`, keeping the center fixed.
    pub fn set_extent(&mut self, axis: Axis, length: f64) -> FieldResult<()> {
        let a = axis.index();
        let center = 0.5 * (self.min[a] + self.max[a]);
        let mut min = self.min;
        let mut max = self.max;
        min[a] = center - 0.5 * length;
        max[a] = center + 0.5 * length;
        self.set_bounds(min, max)
    }

    /// Anchor point `k` (1, 2 or 3).
    pub fn constraint(&self, k: usize) -> FieldResult<Option<Point3<f64>>> {
        Ok(self.constraints[slot(k)?])
    }

    /// Rebind anchor point `k` (1, 2 or 3). Does not move the box.
    pub fn set_constraint(&mut self, k: usize, point: Point3<f64>) -> FieldResult<()> {
        self.constraints[slot(k)?] = Some(point);
        Ok(())
    }

    pub fn clear_constraint(&mut self, k: usize) -> FieldResult<()> {
        self.constraints[slot(k)?] = None;
        Ok(())
    }

    /// The anchor points that are set, in slot order.
    pub fn constraints(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.constraints.iter().flatten().copied()
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn volume(&self) -> f64 {
        self.extent().product()
    }

    /// Closed containment test.
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    /// Whether every set anchor point lies in the box.
    pub fn contains_constraints(&self) -> bool {
        self.constraints().all(|p| self.contains_point(&p))
    }

    /// Write one record: min, max, target vector, three constraints
    /// (NaN when unset), row-major rotation, RGBA color.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_f64s(w, self.min.coords.as_slice())?;
        write_f64s(w, self.max.coords.as_slice())?;
        write_f64s(w, self.target.vector().as_slice())?;
        for c in &self.constraints {
            let p = c.unwrap_or_else(|| Point3::new(f64::NAN, f64::NAN, f64::NAN));
            write_f64s(w, p.coords.as_slice())?;
        }
        for r in 0..3 {
            for c in 0..3 {
                write_f64s(w, &[self.rotation[(r, c)]])?;
            }
        }
        w.write_all(&self.color)
    }

    /// Read one record written by [`Box3D::write_to`].
    pub fn read_from<R: Read>(r: &mut R) -> FieldResult<Self> {
        let fmt = |e: io::Error| FieldError::serialization(format!("box record: {e}"));

        let min = Point3::from(read_f64x3(r).map_err(fmt)?);
        let max = Point3::from(read_f64x3(r).map_err(fmt)?);
        let target_v = Vector3::from(read_f64x3(r).map_err(fmt)?);
        let mut constraints = [None; 3];
        for c in &mut constraints {
            let p = read_f64x3(r).map_err(fmt)?;
            *c = if p.iter().all(|v| v.is_nan()) {
                None
            } else {
                Some(Point3::from(p))
            };
        }
        let mut rotation = Matrix3::zeros();
        for row in 0..3 {
            let v = read_f64x3(r).map_err(fmt)?;
            for (col, x) in v.into_iter().enumerate() {
                rotation[(row, col)] = x;
            }
        }
        let color: Color = read_bytes(r).map_err(fmt)?;

        let target = Direction::from_vector(&target_v).ok_or_else(|| {
            FieldError::serialization(format!("box record: {target_v:?} is not a canonical direction"))
        })?;
        check_bounds(&min, &max)
            .map_err(|e| FieldError::serialization(format!("box record: {e}")))?;

        Ok(Self {
            min,
            max,
            target,
            constraints,
            rotation,
            color,
        })
    }

    /// Serialize a single box.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BOX_RECORD_BYTES);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Parse exactly one box record.
    pub fn from_bytes(bytes: &[u8]) -> FieldResult<Self> {
        if bytes.len() != BOX_RECORD_BYTES {
            return Err(FieldError::serialization(format!(
                "box record is {} bytes, expected {BOX_RECORD_BYTES}",
                bytes.len()
            )));
        }
        let mut r = bytes;
        Self::read_from(&mut r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Box3D {
        Box3D::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0)).unwrap()
    }

    #[test]
    fn test_rejects_degenerate_boxes() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(matches!(
            Box3D::new(p, p),
            Err(FieldError::Geometry { .. })
        ));
        assert!(Box3D::new(Point3::new(0.0, 2.0, 0.0), Point3::new(1.0, 1.0, 1.0)).is_err());
        assert!(Box3D::new(Point3::new(0.0, 0.0, f64::NAN), p).is_err());
    }

    #[test]
    fn test_failed_mutation_leaves_box_unchanged() {
        let mut b = unit();
        let before = b.clone();
        assert!(b.set_min(Point3::new(0.0, 5.0, 0.0)).is_err());
        assert!(b.move_boundary(Direction::PosX, -1.0).is_err());
        assert!(b.set_extent(Axis::Z, 0.0).is_err());
        assert!(b.move_along_axis(Axis::Y, f64::INFINITY).is_err());
        assert_eq!(b, before);
    }

    #[test]
    fn test_move_along_axis_translates() {
        let mut b = unit();
        b.move_along_axis(Axis::Z, -2.5).unwrap();
        assert_eq!(b.min(), Point3::new(0.0, 0.0, -2.5));
        assert_eq!(b.max(), Point3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_move_boundary_grows_outward() {
        let mut b = unit();
        b.move_boundary(Direction::NegY, 1.0).unwrap();
        b.move_boundary(Direction::PosZ, 0.5).unwrap();
        assert_eq!(b.min().y, -1.0);
        assert_eq!(b.max().z, 3.5);
        assert_eq!(b.face_coordinate(Direction::NegY), -1.0);
        assert_eq!(Box3D::coordinate_index(Direction::PosX), 3);
        assert_eq!(Box3D::coordinate_index(Direction::NegZ), 2);
    }

    #[test]
    fn test_set_extent_keeps_center() {
        let mut b = unit();
        b.set_extent(Axis::X, 4.0).unwrap();
        assert_eq!(b.min().x, -1.5);
        assert_eq!(b.max().x, 2.5);
        assert_eq!(b.center(), Point3::new(0.5, 1.0, 1.5));
        assert_eq!(b.volume(), 4.0 * 2.0 * 3.0);
    }

    #[test]
    fn test_constraints() {
        let mut b = unit();
        assert_eq!(b.constraint(2).unwrap(), None);
        b.set_constraint(2, Point3::new(0.5, 0.5, 0.5)).unwrap();
        assert_eq!(b.constraint(2).unwrap(), Some(Point3::new(0.5, 0.5, 0.5)));
        assert!(b.contains_constraints());

        b.set_constraint(3, Point3::new(9.0, 0.0, 0.0)).unwrap();
        assert!(!b.contains_constraints());
        // Rebinding never moves the box.
        assert_eq!(b.max(), Point3::new(1.0, 2.0, 3.0));

        for k in [0, 4] {
            assert!(matches!(
                b.set_constraint(k, Point3::origin()),
                Err(FieldError::InvalidConstraintIndex { index }) if index == k
            ));
        }
        b.clear_constraint(3).unwrap();
        assert_eq!(b.constraints().count(), 1);
    }

    #[test]
    fn test_record_roundtrip() {
        let rot = nalgebra::Rotation3::from_euler_angles(0.1, 0.2, 0.3);
        let mut b = unit()
            .with_target(Direction::NegZ)
            .with_rotation(*rot.matrix());
        b.set_constraint(1, Point3::new(0.1, 0.2, 0.3)).unwrap();

        let bytes = b.to_bytes();
        assert_eq!(bytes.len(), BOX_RECORD_BYTES);
        let back = Box3D::from_bytes(&bytes).unwrap();
        assert_eq!(back, b);
        assert_eq!(back.constraint(2).unwrap(), None);
        assert_eq!(back.color(), Direction::NegZ.color());
    }

    #[test]
    fn test_record_rejects_bad_target() {
        let mut bytes = unit().to_bytes();
        // Overwrite target.x with 0.5.
        bytes[48..56].copy_from_slice(&0.5f64.to_le_bytes());
        assert!(matches!(
            Box3D::from_bytes(&bytes),
            Err(FieldError::SerializationFormat { .. })
        ));
        assert!(Box3D::from_bytes(&bytes[..100]).is_err());
    }
}
