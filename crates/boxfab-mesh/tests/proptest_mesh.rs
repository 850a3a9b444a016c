//! Property tests for mesh transforms and triangle queries.

use boxfab_mesh::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Rotation3, Vector3};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f64> {
    -100.0..100.0f64
}

fn point() -> impl Strategy<Value = Point3<f64>> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| Point3::new(x, y, z))
}

fn triangle() -> impl Strategy<Value = Triangle> {
    (point(), point(), point()).prop_map(|(a, b, c)| Triangle::new(a, b, c))
}

proptest! {
    #[test]
    fn closest_point_is_no_farther_than_corners(tri in triangle(), p in point()) {
        let d = tri.distance_to(&p);
        for corner in tri.vertices() {
            prop_assert!(d <= (p - corner).norm() + 1e-9);
        }
    }

    #[test]
    fn closest_point_lies_in_triangle_bounds(tri in triangle(), p in point()) {
        let q = tri.closest_point(&p);
        let (min, max) = tri.bounds();
        for i in 0..3 {
            prop_assert!(q[i] >= min[i] - 1e-9 && q[i] <= max[i] + 1e-9);
        }
    }

    #[test]
    fn rotation_preserves_face_area(tri in triangle(), angle in -3.0..3.0f64) {
        let mut mesh = Mesh::new();
        for p in tri.vertices() {
            mesh.vertices.push(Vertex::new(p));
        }
        mesh.faces.push([0, 1, 2]);
        let rot = Rotation3::from_axis_angle(&Vector3::x_axis(), angle);
        mesh.transform(rot.matrix());
        let rotated = mesh.triangle(0);
        prop_assert!((rotated.area() - tri.area()).abs() <= 1e-7 * (1.0 + tri.area()));
    }
}
