//! Core mesh types.

use nalgebra::{Matrix3, Point3, Vector3};

/// A vertex with a position and an optional normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in model units.
    pub position: Point3<f64>,

    /// Vertex normal, when the source file carries one.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a vertex at the given position.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed faces.
///
/// Faces are wound counter-clockwise when seen from outside, so the right-hand
/// normal of each face points away from the enclosed volume.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh with room for the given counts.
    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            faces: Vec::with_capacity(faces),
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when the mesh has no faces to work with.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounding box as `(min, max)`, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let (min, max) = self
            .vertices
            .iter()
            .fold((first, first), |(lo, hi), v| {
                (lo.inf(&v.position), hi.sup(&v.position))
            });
        Some((min, max))
    }

    /// Triangle for a face index. Panics on an out-of-range face or vertex index.
    #[inline]
    pub fn triangle(&self, face_index: usize) -> Triangle {
        let [a, b, c] = self.faces[face_index];
        Triangle::new(
            self.vertices[a as usize].position,
            self.vertices[b as usize].position,
            self.vertices[c as usize].position,
        )
    }

    /// Iterate over all faces as triangles, in face order.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.faces.len()).map(|i| self.triangle(i))
    }

    /// Translate every vertex.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for v in &mut self.vertices {
            v.position += offset;
        }
    }

    /// Scale every vertex about the origin.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.vertices {
            v.position.coords *= factor;
        }
    }

    /// Apply a linear map to every vertex position and normal.
    ///
    /// Normals are transformed with the same matrix, which is correct for the
    /// rotations this is meant for.
    pub fn transform(&mut self, matrix: &Matrix3<f64>) {
        for v in &mut self.vertices {
            v.position = Point3::from(matrix * v.position.coords);
            if let Some(n) = v.normal.as_mut() {
                *n = matrix * *n;
            }
        }
    }
}

/// A triangle given by its three corner positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// The three corners in winding order.
    #[inline]
    pub fn vertices(&self) -> [Point3<f64>; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Edge cross product; its length is twice the area.
    fn cross(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, or `None` for a degenerate triangle.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.cross();
        let len = n.norm();
        if len > f64::EPSILON { Some(n / len) } else { None }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.cross().norm() * 0.5
    }

    /// Bounding box of the three corners as `(min, max)`.
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        (
            self.v0.inf(&self.v1).inf(&self.v2),
            self.v0.sup(&self.v1).sup(&self.v2),
        )
    }

    /// Closest point on the triangle to `p`.
    ///
    /// Region classification over the vertex, edge and face Voronoi regions.
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let (a, b, c) = (self.v0, self.v1, self.v2);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;

        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = va + vb + vc;
        if denom.abs() < f64::EPSILON {
            // Degenerate triangle: fall back to the nearest corner.
            return [a, b, c]
                .into_iter()
                .min_by(|x, y| (p - x).norm_squared().total_cmp(&(p - y).norm_squared()))
                .unwrap_or(a);
        }
        let v = vb / denom;
        let w = vc / denom;
        a + ab * v + ac * w
    }

    /// Euclidean distance from `p` to the triangle.
    #[inline]
    pub fn distance_to(&self, p: &Point3<f64>) -> f64 {
        (p - self.closest_point(p)).norm()
    }
}
