//! Backtracking gradient descent on box coordinates.

use nalgebra::{Point3, Vector6};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::box3d::Box3D;
use crate::box_list::BoxList;
use crate::direction::Direction;
use crate::energy::EnergyField;
use crate::error::{FieldError, FieldResult};

/// Step control for [`EnergyField::gradient_descent`].
///
/// Step sizes are in units of the smallest grid spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescentParams {
    /// Stop once the gradient norm falls below this.
    pub gradient_tolerance: f64,

    pub initial_step: f64,

    /// Upper bound on a single step. At most one cell, so a face can never
    /// jump across a frozen node.
    pub max_step: f64,

    /// The search gives up when the step shrinks below this.
    pub min_step: f64,

    /// Step multiplier after an accepted step.
    pub step_growth: f64,

    /// Step multiplier after a rejected candidate.
    pub step_shrink: f64,

    pub max_iterations: usize,
}

impl Default for DescentParams {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-6,
            initial_step: 0.5,
            max_step: 1.0,
            min_step: 1e-4,
            step_growth: 1.5,
            step_shrink: 0.5,
            max_iterations: 2000,
        }
    }
}

impl DescentParams {
    pub fn validate(&self) -> FieldResult<()> {
        if !(self.gradient_tolerance.is_finite() && self.gradient_tolerance >= 0.0) {
            return Err(FieldError::invalid_params(format!(
                "gradient_tolerance must be non-negative, got {}",
                self.gradient_tolerance
            )));
        }
        if !(self.max_step > 0.0 && self.max_step <= 1.0) {
            return Err(FieldError::invalid_params(format!(
                "max_step must be in (0, 1] cells, got {}",
                self.max_step
            )));
        }
        if !(self.min_step > 0.0 && self.min_step <= self.initial_step && self.initial_step <= self.max_step) {
            return Err(FieldError::invalid_params(format!(
                "steps must satisfy 0 < min_step <= initial_step <= max_step, got {} / {} / {}",
                self.min_step, self.initial_step, self.max_step
            )));
        }
        if !(self.step_growth.is_finite() && self.step_growth >= 1.0) {
            return Err(FieldError::invalid_params(format!(
                "step_growth must be at least 1, got {}",
                self.step_growth
            )));
        }
        if !(self.step_shrink > 0.0 && self.step_shrink < 1.0) {
            return Err(FieldError::invalid_params(format!(
                "step_shrink must be in (0, 1), got {}",
                self.step_shrink
            )));
        }
        Ok(())
    }
}

/// Why a descent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Gradient norm below tolerance.
    Converged,
    /// No admissible lower-energy step above the minimum step size.
    StepUnderflow,
    /// Iteration cap reached first.
    IterationCap,
}

/// Outcome of one descent. The box itself is updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescentReport {
    pub energy: f64,
    pub initial_energy: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl DescentReport {
    /// True when the iteration cap cut the descent short.
    pub fn hit_iteration_cap(&self) -> bool {
        self.termination == Termination::IterationCap
    }
}

impl EnergyField<'_> {
    /// Move `b` toward a local energy minimum.
    ///
    /// Candidates are rejected when they would be degenerate, leave the
    /// grid, drop an anchor point the box holds, touch a frozen node with a
    /// face that did not touch it before the step, or fail to lower the
    /// energy. The frozen nodes under each face therefore only ever shrink:
    /// a seed face that starts on the kernel band may leave it but never
    /// slides onto another frozen node. Each accepted box is appended to
    /// `trajectory` when one is given.
    pub fn gradient_descent(
        &self,
        b: &mut Box3D,
        mut trajectory: Option<&mut BoxList>,
    ) -> FieldResult<DescentReport> {
        let params = &self.descent;
        let cell = self.grid.min_spacing();
        let holds_constraints = b.contains_constraints();

        let initial_energy = self.energy(b)?;
        let mut energy = initial_energy;
        let mut frozen = self.frozen_face_nodes(b);
        let mut step = params.initial_step.min(params.max_step);
        let mut iterations = 0;

        let termination = loop {
            if iterations >= params.max_iterations {
                break Termination::IterationCap;
            }
            iterations += 1;

            let grad = self.gradient(b)?;
            let norm = grad.norm();
            if norm < params.gradient_tolerance {
                break Termination::Converged;
            }
            let dir = -grad / norm;
            let coords = b.coordinates();

            let mut accepted = None;
            while step >= params.min_step {
                let candidate = coords + dir * (step * cell);
                if let Some(found) =
                    self.admissible(b, &candidate, energy, &frozen, holds_constraints)?
                {
                    accepted = Some(found);
                    break;
                }
                step *= params.step_shrink;
            }
            let Some((next, next_energy, next_frozen)) = accepted else {
                break Termination::StepUnderflow;
            };

            *b = next;
            energy = next_energy;
            frozen = next_frozen;
            if let Some(t) = trajectory.as_deref_mut() {
                t.push(b.clone());
            }
            step = (step * params.step_growth).min(params.max_step);
        };

        trace!(
            iterations,
            initial_energy,
            energy,
            termination = ?termination,
            "Descent finished"
        );
        Ok(DescentReport {
            energy,
            initial_energy,
            iterations,
            termination,
        })
    }

    fn admissible(
        &self,
        current: &Box3D,
        coords: &Vector6<f64>,
        energy: f64,
        frozen: &FaceNodes,
        holds_constraints: bool,
    ) -> FieldResult<Option<(Box3D, f64, FaceNodes)>> {
        let Ok(candidate) = current.with_coordinates(coords) else {
            return Ok(None);
        };
        if !self.grid.contains(&candidate.min()) || !self.grid.contains(&candidate.max()) {
            return Ok(None);
        }
        if holds_constraints && !candidate.contains_constraints() {
            return Ok(None);
        }
        let next_frozen = self.frozen_face_nodes(&candidate);
        let gained = next_frozen
            .iter()
            .zip(frozen)
            .any(|(now, before)| now.iter().any(|n| before.binary_search(n).is_err()));
        if gained {
            return Ok(None);
        }
        let next_energy = self.energy(&candidate)?;
        if next_energy < energy {
            Ok(Some((candidate, next_energy, next_frozen)))
        } else {
            Ok(None)
        }
    }

    /// Per face, in [`Direction::ALL`] order, whether it touches a frozen node.
    pub fn frozen_faces(&self, b: &Box3D) -> [bool; 6] {
        self.frozen_face_nodes(b).map(|nodes| !nodes.is_empty())
    }

    /// Per face, in [`Direction::ALL`] order, the frozen nodes it touches as
    /// ascending linear indices.
    pub fn frozen_face_nodes(&self, b: &Box3D) -> FaceNodes {
        Direction::ALL.map(|face| {
            let (lo, hi) = face_region(b, face);
            self.grid.frozen_nodes_in(&lo, &hi)
        })
    }
}

/// Frozen node indices under each of the six faces of a box.
pub type FaceNodes = [Vec<usize>; 6];

/// The closed face of `b` with outward normal `face`, as a flat region.
fn face_region(b: &Box3D, face: Direction) -> (Point3<f64>, Point3<f64>) {
    let a = face.axis().index();
    let at = b.face_coordinate(face);
    let (mut lo, mut hi) = (b.min(), b.max());
    lo[a] = at;
    hi[a] = at;
    (lo, hi)
}
