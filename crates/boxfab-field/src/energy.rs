//! Box energy on a weighted grid.
//!
//! Each of the six faces contributes `alpha * area * mean(w)`, where `w` is
//! the tricubic weight sampled at five probes spread over the face and
//! `alpha` scales faces by their alignment with the box target. The
//! gradient is taken with respect to the coordinate vector
//! `(min.x, min.y, min.z, max.x, max.y, max.z)`.

use nalgebra::{Point3, Vector6};
use serde::{Deserialize, Serialize};

use crate::box3d::Box3D;
use crate::descent::DescentParams;
use crate::direction::Direction;
use crate::error::{FieldError, FieldResult};
use crate::grid::ScalarGrid;

/// Face probes in local `(u, v)` coordinates: the center and four
/// quarter points.
const PROBES: [(f64, f64); 5] = [
    (0.5, 0.5),
    (0.25, 0.25),
    (0.75, 0.25),
    (0.25, 0.75),
    (0.75, 0.75),
];

/// Weighting of the energy terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyParams {
    /// Factor on the face whose outward normal is the box target.
    pub target_face_factor: f64,

    /// Factor on the face opposite the target.
    pub opposite_face_factor: f64,

    /// Finite-difference step as a fraction of the smallest grid spacing.
    pub finite_difference_step: f64,
}

impl Default for EnergyParams {
    fn default() -> Self {
        Self {
            target_face_factor: 2.0,
            opposite_face_factor: 0.5,
            finite_difference_step: 1e-5,
        }
    }
}

impl EnergyParams {
    pub fn validate(&self) -> FieldResult<()> {
        for (name, v) in [
            ("target_face_factor", self.target_face_factor),
            ("opposite_face_factor", self.opposite_face_factor),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(FieldError::invalid_params(format!(
                    "{name} must be finite and non-negative, got {v}"
                )));
            }
        }
        if !(self.finite_difference_step.is_finite() && self.finite_difference_step > 0.0) {
            return Err(FieldError::invalid_params(format!(
                "finite_difference_step must be positive, got {}",
                self.finite_difference_step
            )));
        }
        Ok(())
    }

    /// Alignment factor of `face` for a box targeting `target`.
    pub fn face_factor(&self, face: Direction, target: Direction) -> f64 {
        if face == target {
            self.target_face_factor
        } else if face == target.opposite() {
            self.opposite_face_factor
        } else {
            1.0
        }
    }
}

/// Energy functional bound to one grid.
///
/// Holds only a shared reference, so one field can drive many
/// optimizations concurrently.
#[derive(Debug, Clone)]
pub struct EnergyField<'g> {
    pub(crate) grid: &'g ScalarGrid,
    pub(crate) params: EnergyParams,
    pub(crate) descent: DescentParams,
}

impl<'g> EnergyField<'g> {
    pub fn new(grid: &'g ScalarGrid) -> Self {
        Self::with_params(grid, EnergyParams::default())
    }

    pub fn with_params(grid: &'g ScalarGrid, params: EnergyParams) -> Self {
        Self {
            grid,
            params,
            descent: DescentParams::default(),
        }
    }

    pub fn with_descent(mut self, descent: DescentParams) -> Self {
        self.descent = descent;
        self
    }

    #[inline]
    pub fn grid(&self) -> &'g ScalarGrid {
        self.grid
    }

    pub fn params(&self) -> &EnergyParams {
        &self.params
    }

    pub fn descent_params(&self) -> &DescentParams {
        &self.descent
    }

    /// Energy of `b`. Fails with `OutOfDomain` unless both corners are inside the grid.
    pub fn energy(&self, b: &Box3D) -> FieldResult<f64> {
        self.evaluate(&b.coordinates(), b.target(), false)
            .map(|(e, _)| e)
    }

    /// Analytic gradient with respect to `(min, max)`.
    pub fn gradient(&self, b: &Box3D) -> FieldResult<Vector6<f64>> {
        self.evaluate(&b.coordinates(), b.target(), true)
            .map(|(_, g)| g)
    }

    pub fn energy_and_gradient(&self, b: &Box3D) -> FieldResult<(f64, Vector6<f64>)> {
        self.evaluate(&b.coordinates(), b.target(), true)
    }

    /// Central-difference gradient, one-sided for coordinates whose
    /// perturbation would leave the grid.
    pub fn gradient_finite_difference(&self, b: &Box3D) -> FieldResult<Vector6<f64>> {
        let c = b.coordinates();
        let target = b.target();
        let h = self.params.finite_difference_step * self.grid.min_spacing();
        let e0 = self.evaluate(&c, target, false)?.0;

        let mut grad = Vector6::zeros();
        for i in 0..6 {
            let mut plus = c;
            let mut minus = c;
            plus[i] += h;
            minus[i] -= h;
            grad[i] = match (self.energy_inside(&plus, target)?, self.energy_inside(&minus, target)?) {
                (Some(ep), Some(em)) => (ep - em) / (2.0 * h),
                (Some(ep), None) => (ep - e0) / h,
                (None, Some(em)) => (e0 - em) / h,
                (None, None) => 0.0,
            };
        }
        Ok(grad)
    }

    fn energy_inside(&self, c: &Vector6<f64>, target: Direction) -> FieldResult<Option<f64>> {
        match self.evaluate(c, target, false) {
            Ok((e, _)) => Ok(Some(e)),
            Err(FieldError::OutOfDomain { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn evaluate(
        &self,
        c: &Vector6<f64>,
        target: Direction,
        with_gradient: bool,
    ) -> FieldResult<(f64, Vector6<f64>)> {
        let min = Point3::new(c[0], c[1], c[2]);
        let max = Point3::new(c[3], c[4], c[5]);
        self.grid.check_domain(&min)?;
        self.grid.check_domain(&max)?;

        let n = PROBES.len() as f64;
        let mut energy = 0.0;
        let mut grad = Vector6::zeros();

        for face in Direction::ALL {
            let alpha = self.params.face_factor(face, target);
            let a = face.axis().index();
            let (b, d) = face.axis().others();
            let (b, d) = (b.index(), d.index());
            let ci = Box3D::coordinate_index(face);
            let (lb, ld) = (max[b] - min[b], max[d] - min[d]);
            let area = lb * ld;

            let mut p = Point3::origin();
            p[a] = c[ci];
            let mut mean = 0.0;
            let mut dmean = Vector6::zeros();
            for (u, v) in PROBES {
                p[b] = min[b] + u * lb;
                p[d] = min[d] + v * ld;
                if with_gradient {
                    let (w, gw) = self.grid.tricubic(&p)?;
                    mean += w;
                    dmean[ci] += gw[a];
                    dmean[b] += (1.0 - u) * gw[b];
                    dmean[3 + b] += u * gw[b];
                    dmean[d] += (1.0 - v) * gw[d];
                    dmean[3 + d] += v * gw[d];
                } else {
                    mean += self.grid.sample_tricubic(&p)?;
                }
            }
            mean /= n;
            energy += alpha * area * mean;

            if with_gradient {
                let mut darea = Vector6::zeros();
                darea[b] -= ld;
                darea[3 + b] += ld;
                darea[d] -= lb;
                darea[3 + d] += lb;
                grad += (darea * mean + dmean * (area / n)) * alpha;
            }
        }
        Ok((energy, grad))
    }
}
