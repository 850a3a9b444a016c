//! The discretized scalar field and its samplers.
//!
//! A [`ScalarGrid`] keeps two node arrays: the signed distances it was built
//! from, and the weights the energy is evaluated on. Weights start as a copy
//! of the distances (or of the sampler's weight column when one was
//! supplied) and are replaced by [`ScalarGrid::calculate_weights`].
//!
//! Node `(i, j, k)` sits at `bounds_min + (i, j, k) * spacing` with
//! `spacing = (bounds_max - bounds_min) / (resolution - 1)` per axis.

mod data;
mod interp;
mod kernel;
mod state;

pub use data::GridData;
pub use kernel::{FreezeStats, WeightParams, WeightStats};

use nalgebra::{Point3, Vector3};
use std::ops::RangeInclusive;

use crate::direction::Direction;
use crate::error::{FieldError, FieldResult};

/// Slack allowed when testing whether a point is inside the domain.
const DOMAIN_EPS: f64 = 1e-9;

/// Width of the domain along `axis`, computed wide enough not to overflow.
fn axis_span(bounds_min: [i32; 3], bounds_max: [i32; 3], axis: usize) -> f64 {
    (i64::from(bounds_max[axis]) - i64::from(bounds_min[axis])) as f64
}

/// A scalar field sampled on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    resolution: [usize; 3],
    bounds_min: [i32; 3],
    bounds_max: [i32; 3],
    spacing: Vector3<f64>,
    distances: Vec<f64>,
    values: Vec<f64>,
    target: Direction,
    kernel_distance: f64,
    frozen: Vec<bool>,
    frozen_count: usize,
}

impl ScalarGrid {
    /// Build a grid from sampler output.
    ///
    /// The data is validated first; on error nothing is constructed.
    pub fn from_grid_data(data: GridData) -> FieldResult<Self> {
        data.validate()?;
        let GridData {
            bounds_min,
            bounds_max,
            resolution,
            values: distances,
            weights,
        } = data;

        let spacing = Vector3::from_fn(|a, _| {
            axis_span(bounds_min, bounds_max, a) / (resolution[a] - 1) as f64
        });
        let values = weights.unwrap_or_else(|| distances.clone());
        let n = distances.len();

        Ok(Self {
            resolution,
            bounds_min,
            bounds_max,
            spacing,
            distances,
            values,
            target: Direction::PosZ,
            kernel_distance: 0.0,
            frozen: vec![false; n],
            frozen_count: 0,
        })
    }

    /// Build a grid by evaluating `f` (a signed distance) at every node.
    pub fn from_fn(
        resolution: [usize; 3],
        bounds_min: [i32; 3],
        bounds_max: [i32; 3],
        f: impl Fn(Point3<f64>) -> f64,
    ) -> FieldResult<Self> {
        let mut values = Vec::with_capacity(resolution.iter().product());
        let spacing =
            |a: usize| axis_span(bounds_min, bounds_max, a) / (resolution[a].max(2) - 1) as f64;
        let (hx, hy, hz) = (spacing(0), spacing(1), spacing(2));
        for i in 0..resolution[0] {
            for j in 0..resolution[1] {
                for k in 0..resolution[2] {
                    values.push(f(Point3::new(
                        f64::from(bounds_min[0]) + i as f64 * hx,
                        f64::from(bounds_min[1]) + j as f64 * hy,
                        f64::from(bounds_min[2]) + k as f64 * hz,
                    )));
                }
            }
        }
        Self::from_grid_data(GridData {
            bounds_min,
            bounds_max,
            resolution,
            values,
            weights: None,
        })
    }

    #[inline]
    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    #[inline]
    pub fn bounds_min(&self) -> [i32; 3] {
        self.bounds_min
    }

    #[inline]
    pub fn bounds_max(&self) -> [i32; 3] {
        self.bounds_max
    }

    #[inline]
    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// Smallest node spacing over the three axes.
    #[inline]
    pub fn min_spacing(&self) -> f64 {
        self.spacing.min()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn target(&self) -> Direction {
        self.target
    }

    /// Change the target without recomputing weights.
    pub fn set_target(&mut self, target: Direction) {
        self.target = target;
    }

    #[inline]
    pub fn kernel_distance(&self) -> f64 {
        self.kernel_distance
    }

    /// Record a kernel distance without re-freezing.
    ///
    /// The frozen mask only changes on [`ScalarGrid::freeze_kernel`].
    pub fn set_kernel_distance(&mut self, distance: f64) {
        self.kernel_distance = distance;
    }

    /// The weights the energy is evaluated on.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The signed distances the grid was built from.
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn domain_min(&self) -> Point3<f64> {
        Point3::from(self.bounds_min.map(f64::from))
    }

    pub fn domain_max(&self) -> Point3<f64> {
        Point3::from(self.bounds_max.map(f64::from))
    }

    /// Linear index of node `(i, j, k)`; z varies fastest.
    #[inline]
    pub fn linearize(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.resolution[1] + j) * self.resolution[2] + k
    }

    #[inline]
    pub fn delinearize(&self, index: usize) -> [usize; 3] {
        let [_, ny, nz] = self.resolution;
        [index / (ny * nz), (index / nz) % ny, index % nz]
    }

    pub fn node_position(&self, i: usize, j: usize, k: usize) -> Point3<f64> {
        Point3::new(
            f64::from(self.bounds_min[0]) + i as f64 * self.spacing.x,
            f64::from(self.bounds_min[1]) + j as f64 * self.spacing.y,
            f64::from(self.bounds_min[2]) + k as f64 * self.spacing.z,
        )
    }

    #[inline]
    pub fn node_value(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.linearize(i, j, k)]
    }

    /// True when `p` lies in the closed domain.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|a| {
            p[a] >= f64::from(self.bounds_min[a]) - DOMAIN_EPS
                && p[a] <= f64::from(self.bounds_max[a]) + DOMAIN_EPS
        })
    }

    pub(crate) fn check_domain(&self, p: &Point3<f64>) -> FieldResult<()> {
        if self.contains(p) {
            Ok(())
        } else {
            Err(FieldError::OutOfDomain {
                point: [p.x, p.y, p.z],
                bounds_min: self.bounds_min,
                bounds_max: self.bounds_max,
            })
        }
    }

    /// Cell containing `p` and the local coordinates inside it.
    ///
    /// Points on the upper boundary fall in the last cell with `t = 1`.
    fn locate(&self, p: &Point3<f64>) -> ([usize; 3], [f64; 3]) {
        let mut cell = [0usize; 3];
        let mut t = [0.0f64; 3];
        for a in 0..3 {
            let g = (p[a] - f64::from(self.bounds_min[a])) / self.spacing[a];
            let last = (self.resolution[a] - 2) as f64;
            let c = g.floor().clamp(0.0, last);
            cell[a] = c as usize;
            t[a] = (g - c).clamp(0.0, 1.0);
        }
        (cell, t)
    }

    /// Node index along `axis`, offset from `base` and clamped to the grid.
    #[inline]
    fn clamped(&self, axis: usize, base: usize, offset: isize) -> usize {
        let last = self.resolution[axis] as isize - 1;
        (base as isize + offset).clamp(0, last) as usize
    }

    fn trilinear(&self, nodes: &[f64], p: &Point3<f64>) -> FieldResult<f64> {
        self.check_domain(p)?;
        let ([i, j, k], t) = self.locate(p);
        let (wx, wy, wz) = (interp::linear(t[0]), interp::linear(t[1]), interp::linear(t[2]));

        let mut acc = 0.0;
        for (a, wa) in wx.iter().enumerate() {
            for (b, wb) in wy.iter().enumerate() {
                for (c, wc) in wz.iter().enumerate() {
                    acc += wa * wb * wc * nodes[self.linearize(i + a, j + b, k + c)];
                }
            }
        }
        Ok(acc)
    }

    /// Trilinear interpolation of the weights among the 8 surrounding nodes.
    pub fn sample(&self, p: &Point3<f64>) -> FieldResult<f64> {
        self.trilinear(&self.values, p)
    }

    /// Trilinear interpolation of the signed distance.
    pub fn distance_at(&self, p: &Point3<f64>) -> FieldResult<f64> {
        self.trilinear(&self.distances, p)
    }

    /// Tricubic interpolation of the weights over the 4x4x4 neighborhood.
    pub fn sample_tricubic(&self, p: &Point3<f64>) -> FieldResult<f64> {
        self.tricubic(p).map(|(v, _)| v)
    }

    /// Gradient of [`ScalarGrid::sample_tricubic`] in world units.
    pub fn gradient_tricubic(&self, p: &Point3<f64>) -> FieldResult<Vector3<f64>> {
        self.tricubic(p).map(|(_, g)| g)
    }

    /// Value and gradient in one pass.
    pub fn tricubic(&self, p: &Point3<f64>) -> FieldResult<(f64, Vector3<f64>)> {
        self.check_domain(p)?;
        let ([i, j, k], t) = self.locate(p);
        let (wx, dx) = interp::catmull_rom(t[0]);
        let (wy, dy) = interp::catmull_rom(t[1]);
        let (wz, dz) = interp::catmull_rom(t[2]);

        let mut value = 0.0;
        let mut grad = Vector3::zeros();
        for a in 0..4 {
            let ii = self.clamped(0, i, a as isize - 1);
            for b in 0..4 {
                let jj = self.clamped(1, j, b as isize - 1);
                let row = (ii * self.resolution[1] + jj) * self.resolution[2];
                for c in 0..4 {
                    let kk = self.clamped(2, k, c as isize - 1);
                    let v = self.values[row + kk];
                    value += wx[a] * wy[b] * wz[c] * v;
                    grad.x += dx[a] * wy[b] * wz[c] * v;
                    grad.y += wx[a] * dy[b] * wz[c] * v;
                    grad.z += wx[a] * wy[b] * dz[c] * v;
                }
            }
        }
        Ok((value, grad.component_div(&self.spacing)))
    }

    /// Nodes along `axis` whose nearest-node cells meet `[lo, hi]`.
    ///
    /// `None` when the interval misses the grid entirely.
    pub(crate) fn node_span(&self, axis: usize, lo: f64, hi: f64) -> Option<RangeInclusive<usize>> {
        let origin = f64::from(self.bounds_min[axis]);
        let h = self.spacing[axis];
        let last = self.resolution[axis] as f64 - 1.0;
        let first = ((lo - origin) / h).round();
        let end = ((hi - origin) / h).round();
        if end < 0.0 || first > last || first > end {
            return None;
        }
        Some(first.max(0.0) as usize..=end.min(last) as usize)
    }

    /// Whether node `(i, j, k)` is frozen.
    #[inline]
    pub fn is_frozen(&self, i: usize, j: usize, k: usize) -> bool {
        self.frozen[self.linearize(i, j, k)]
    }

    /// Whether the node nearest to `p` is frozen. False outside the domain.
    pub fn is_frozen_at(&self, p: &Point3<f64>) -> bool {
        if self.frozen_count == 0 || !self.contains(p) {
            return false;
        }
        let idx: [usize; 3] = std::array::from_fn(|a| {
            let g = (p[a] - f64::from(self.bounds_min[a])) / self.spacing[a];
            (g.round().max(0.0) as usize).min(self.resolution[a] - 1)
        });
        self.is_frozen(idx[0], idx[1], idx[2])
    }

    /// Whether any frozen node is nearest to some point of the closed
    /// axis-aligned region `[min, max]`. Degenerate regions (faces) are fine.
    pub fn region_touches_frozen(&self, min: &Point3<f64>, max: &Point3<f64>) -> bool {
        !self.frozen_nodes_in(min, max).is_empty()
    }

    /// Linear indices, ascending, of the frozen nodes nearest to some point
    /// of the closed region `[min, max]`.
    pub fn frozen_nodes_in(&self, min: &Point3<f64>, max: &Point3<f64>) -> Vec<usize> {
        if self.frozen_count == 0 {
            return Vec::new();
        }
        let (Some(xs), Some(ys), Some(zs)) = (
            self.node_span(0, min.x, max.x),
            self.node_span(1, min.y, max.y),
            self.node_span(2, min.z, max.z),
        ) else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        for i in xs {
            for j in ys.clone() {
                for k in zs.clone() {
                    let n = self.linearize(i, j, k);
                    if self.frozen[n] {
                        nodes.push(n);
                    }
                }
            }
        }
        nodes
    }

    #[inline]
    pub fn frozen_count(&self) -> usize {
        self.frozen_count
    }

    /// Frozen flag per node, in node order.
    pub fn frozen_mask(&self) -> &[bool] {
        &self.frozen
    }
}
