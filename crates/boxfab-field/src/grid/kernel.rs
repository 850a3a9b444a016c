//! Weight calculation and kernel freezing.

use boxfab_mesh::{Mesh, Triangle};
use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ScalarGrid;
use crate::direction::Direction;
use crate::error::{FieldError, FieldResult};

/// Weight given to nodes near surfaces facing away from the target.
const FLIPPED_WEIGHT: f64 = 1.0;

/// Parameters for turning signed distances into energy weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightParams {
    /// Distance over which weights ramp from -1 (inside) to +1 (outside).
    pub falloff: f64,

    /// Faces with `normal . target` below this count as facing away.
    pub flip_threshold: f64,

    /// Nodes closer than this to a facing-away face get the flipped weight.
    pub flip_margin: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            falloff: 1.0,
            flip_threshold: -1e-3,
            flip_margin: 1.0,
        }
    }
}

impl WeightParams {
    pub fn validate(&self) -> FieldResult<()> {
        if !(self.falloff.is_finite() && self.falloff > 0.0) {
            return Err(FieldError::invalid_params(format!(
                "weight falloff must be positive, got {}",
                self.falloff
            )));
        }
        if !(self.flip_margin.is_finite() && self.flip_margin >= 0.0) {
            return Err(FieldError::invalid_params(format!(
                "flip margin must be non-negative, got {}",
                self.flip_margin
            )));
        }
        if !self.flip_threshold.is_finite() {
            return Err(FieldError::invalid_params("flip threshold must be finite"));
        }
        Ok(())
    }
}

/// Summary of a weight calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightStats {
    pub flipped_faces: usize,
    pub flipped_nodes: usize,
}

/// Summary of a kernel freeze.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreezeStats {
    /// Faces that project to a non-empty area across the target axis.
    pub projected_faces: usize,
    pub frozen_nodes: usize,
}

impl ScalarGrid {
    /// Replace the weights with values derived from the distances, the mesh
    /// and `target`.
    ///
    /// A node's weight is its signed distance scaled by `falloff` and clamped
    /// to `[-1, 1]`. Nodes within `flip_margin` of a face that points away
    /// from `target` are raised to the outside weight so boxes do not grow
    /// across undercuts.
    pub fn calculate_weights(
        &mut self,
        mesh: &Mesh,
        target: Direction,
        params: &WeightParams,
    ) -> FieldResult<WeightStats> {
        params.validate()?;
        self.target = target;
        let t = target.vector();

        let flipped: Vec<Triangle> = mesh
            .triangles()
            .filter(|tri| tri.normal().is_some_and(|n| n.dot(&t) < params.flip_threshold))
            .collect();

        let margin = params.flip_margin;
        let near: Vec<usize> = flipped
            .par_iter()
            .flat_map_iter(|tri| self.nodes_near(tri, margin))
            .collect();

        let mut is_flipped = vec![false; self.node_count()];
        for idx in near {
            is_flipped[idx] = true;
        }
        let flipped_nodes = is_flipped.iter().filter(|&&f| f).count();

        let falloff = params.falloff;
        self.values = self
            .distances
            .par_iter()
            .zip(is_flipped.par_iter())
            .map(|(&s, &flip)| {
                if flip {
                    FLIPPED_WEIGHT
                } else {
                    (s / falloff).clamp(-1.0, 1.0)
                }
            })
            .collect();

        let stats = WeightStats {
            flipped_faces: flipped.len(),
            flipped_nodes,
        };
        info!(
            direction = %target,
            flipped_faces = stats.flipped_faces,
            flipped_nodes = stats.flipped_nodes,
            "Calculated grid weights"
        );
        Ok(stats)
    }

    /// Node indices within `margin` of `tri`.
    fn nodes_near(&self, tri: &Triangle, margin: f64) -> Vec<usize> {
        let (lo, hi) = tri.bounds();
        let spans = (
            self.node_span(0, lo.x - margin, hi.x + margin),
            self.node_span(1, lo.y - margin, hi.y + margin),
            self.node_span(2, lo.z - margin, hi.z + margin),
        );
        let (Some(xs), Some(ys), Some(zs)) = spans else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for i in xs {
            for j in ys.clone() {
                for k in zs.clone() {
                    if tri.distance_to(&self.node_position(i, j, k)) <= margin {
                        out.push(self.linearize(i, j, k));
                    }
                }
            }
        }
        out
    }

    /// Mark the kernel: nodes inside (or on) the surface whose distance to
    /// the surface along the target axis is at most `distance`.
    ///
    /// The distance is measured by dropping a line parallel to the target
    /// axis through each node and intersecting it with every face. Faces
    /// parallel to the axis are skipped. Replaces any previous mask.
    pub fn freeze_kernel(&mut self, mesh: &Mesh, distance: f64) -> FieldResult<FreezeStats> {
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(FieldError::invalid_params(format!(
                "kernel distance must be non-negative, got {distance}"
            )));
        }
        self.kernel_distance = distance;

        let triangles: Vec<Triangle> = mesh.triangles().collect();
        let hits: Vec<Vec<usize>> = triangles
            .par_iter()
            .map(|tri| self.kernel_nodes(tri, distance))
            .collect();
        let projected_faces = hits.iter().filter(|h| !h.is_empty()).count();

        self.frozen.iter_mut().for_each(|f| *f = false);
        for idx in hits.into_iter().flatten() {
            if self.distances[idx] <= 0.0 {
                self.frozen[idx] = true;
            }
        }
        self.frozen_count = self.frozen.iter().filter(|&&f| f).count();

        let stats = FreezeStats {
            projected_faces,
            frozen_nodes: self.frozen_count,
        };
        info!(
            direction = %self.target,
            distance = distance,
            frozen_nodes = stats.frozen_nodes,
            "Froze kernel"
        );
        Ok(stats)
    }

    /// Nodes whose vertical line crosses `tri` within `distance`.
    fn kernel_nodes(&self, tri: &Triangle, distance: f64) -> Vec<usize> {
        let up = self.target.axis();
        let (u, v) = up.others();
        let (a, b, c) = (up.index(), u.index(), v.index());

        let p = tri.vertices();
        let det = (p[1][b] - p[0][b]) * (p[2][c] - p[0][c])
            - (p[2][b] - p[0][b]) * (p[1][c] - p[0][c]);
        if det.abs() < 1e-12 {
            return Vec::new();
        }

        let (lo, hi) = tri.bounds();
        let mut lo_r = lo;
        let mut hi_r = hi;
        lo_r[a] -= distance;
        hi_r[a] += distance;
        let spans = (
            self.node_span(0, lo_r.x, hi_r.x),
            self.node_span(1, lo_r.y, hi_r.y),
            self.node_span(2, lo_r.z, hi_r.z),
        );
        let (Some(xs), Some(ys), Some(zs)) = spans else {
            return Vec::new();
        };
        let ranges = [xs, ys, zs];

        let mut out = Vec::new();
        for ib in ranges[b].clone() {
            for ic in ranges[c].clone() {
                let mut idx = [0usize; 3];
                idx[b] = ib;
                idx[c] = ic;
                let q: Point3<f64> = self.node_position(idx[0], idx[1], idx[2]);

                // Barycentric coordinates of the node's projection.
                let l1 = ((q[b] - p[0][b]) * (p[2][c] - p[0][c])
                    - (p[2][b] - p[0][b]) * (q[c] - p[0][c]))
                    / det;
                let l2 = ((p[1][b] - p[0][b]) * (q[c] - p[0][c])
                    - (q[b] - p[0][b]) * (p[1][c] - p[0][c]))
                    / det;
                let l0 = 1.0 - l1 - l2;
                const EPS: f64 = -1e-9;
                if l0 < EPS || l1 < EPS || l2 < EPS {
                    continue;
                }
                let height = l0 * p[0][a] + l1 * p[1][a] + l2 * p[2][a];

                for ia in ranges[a].clone() {
                    idx[a] = ia;
                    let z = self.node_position(idx[0], idx[1], idx[2])[a];
                    if (z - height).abs() <= distance + 1e-9 {
                        out.push(self.linearize(idx[0], idx[1], idx[2]));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxfab_mesh::Vertex;

    /// Axis-aligned cube [lo, hi]^3 with outward winding.
    fn cube(lo: f64, hi: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for &(x, y, z) in &[
            (lo, lo, lo),
            (hi, lo, lo),
            (hi, hi, lo),
            (lo, hi, lo),
            (lo, lo, hi),
            (hi, lo, hi),
            (hi, hi, hi),
            (lo, hi, hi),
        ] {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces.extend_from_slice(&[
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ]);
        mesh
    }

    fn box_sdf(p: Point3<f64>, lo: f64, hi: f64) -> f64 {
        let c = (lo + hi) / 2.0;
        let r = (hi - lo) / 2.0;
        let q = (p.coords - nalgebra::Vector3::repeat(c)).abs() - nalgebra::Vector3::repeat(r);
        let outside = q.map(|v| v.max(0.0)).norm();
        outside + q.max().min(0.0)
    }

    fn cube_grid() -> (ScalarGrid, Mesh) {
        let grid =
            ScalarGrid::from_fn([11, 11, 11], [0, 0, 0], [10, 10, 10], |p| box_sdf(p, 3.0, 7.0))
                .unwrap();
        (grid, cube(3.0, 7.0))
    }

    #[test]
    fn test_weights_follow_distance() {
        let (mut grid, mesh) = cube_grid();
        let params = WeightParams {
            flip_margin: 0.0,
            flip_threshold: -2.0,
            ..Default::default()
        };
        let stats = grid.calculate_weights(&mesh, Direction::PosZ, &params).unwrap();
        assert_eq!(stats.flipped_faces, 0);
        assert_eq!(grid.target(), Direction::PosZ);
        assert_eq!(grid.node_value(5, 5, 5), -1.0);
        assert_eq!(grid.node_value(0, 0, 0), 1.0);
        assert_eq!(grid.node_value(5, 5, 7), 0.0);
    }

    #[test]
    fn test_faces_away_from_target_raise_weights() {
        let (mut grid, mesh) = cube_grid();
        let stats = grid
            .calculate_weights(&mesh, Direction::PosZ, &WeightParams::default())
            .unwrap();
        // Bottom (-z) face is flipped; side faces are perpendicular.
        assert_eq!(stats.flipped_faces, 2);
        // Interior node right above the bottom face.
        assert_eq!(grid.node_value(5, 5, 4), FLIPPED_WEIGHT);
        // Interior node near the top stays inside.
        assert_eq!(grid.node_value(5, 5, 6), -1.0);
    }

    #[test]
    fn test_freeze_kernel_marks_inside_band() {
        let (mut grid, mesh) = cube_grid();
        grid.set_target(Direction::PosZ);
        let stats = grid.freeze_kernel(&mesh, 1.0).unwrap();
        assert!(stats.frozen_nodes > 0);
        assert_eq!(grid.kernel_distance(), 1.0);
        // Top surface and one layer below are frozen inside the footprint.
        assert!(grid.is_frozen(5, 5, 7));
        assert!(grid.is_frozen(5, 5, 6));
        // Middle of the cube is two units from both caps.
        assert!(!grid.is_frozen(5, 5, 5));
        // Outside the cube nothing freezes.
        assert!(!grid.is_frozen(5, 5, 8));
        assert!(!grid.is_frozen(1, 5, 7));
        assert!(grid.is_frozen_at(&Point3::new(5.2, 4.9, 6.3)));
    }

    #[test]
    fn test_freeze_kernel_replaces_previous_mask() {
        let (mut grid, mesh) = cube_grid();
        grid.freeze_kernel(&mesh, 2.0).unwrap();
        let wide = grid.frozen_count();
        grid.freeze_kernel(&mesh, 0.0).unwrap();
        assert!(grid.frozen_count() < wide);
        assert!(!grid.is_frozen(5, 5, 6));
    }

    #[test]
    fn test_region_touches_frozen() {
        let (mut grid, mesh) = cube_grid();
        grid.freeze_kernel(&mesh, 0.5).unwrap();
        let lo = Point3::new(4.0, 4.0, 7.0);
        let hi = Point3::new(6.0, 6.0, 7.0);
        assert!(grid.region_touches_frozen(&lo, &hi));
        let lo = Point3::new(4.0, 4.0, 8.0);
        let hi = Point3::new(6.0, 6.0, 8.0);
        assert!(!grid.region_touches_frozen(&lo, &hi));
    }

    #[test]
    fn test_invalid_parameters() {
        let (mut grid, mesh) = cube_grid();
        assert!(grid.freeze_kernel(&mesh, -1.0).is_err());
        let params = WeightParams {
            falloff: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            grid.calculate_weights(&mesh, Direction::PosX, &params),
            Err(FieldError::InvalidParams { .. })
        ));
    }
}
