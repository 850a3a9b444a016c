//! Orchestration of the six orientation runs.
//!
//! Each orientation prepares its own copy of the mesh, samples a field
//! for it, builds and freezes a grid, seeds boxes from the faces facing its
//! target and optimizes them. The per-orientation lists are then merged in
//! orientation order.
//!
//! Sampler failures are contained to the orientation they happen in. Any
//! other error aborts the run.

mod builder;
mod params;
mod seed;

pub use builder::EngineBuilder;
pub use params::{FabricationParams, ORIENTATION_COUNT};
pub use seed::{SEED_MARGIN, orientation_rotation, orientation_target, scale_to_resolution, seed_boxes};

use std::fs;
use std::path::Path;

use boxfab_mesh::progress::{ProgressCallback, ProgressTracker};
use boxfab_mesh::tracing_ext::{PhaseTimer, log_mesh_stats};
use boxfab_mesh::{Mesh, save_obj};
use nalgebra::Matrix3;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::box_list::BoxList;
use crate::box3d::Box3D;
use crate::descent::{DescentReport, Termination};
use crate::direction::Direction;
use crate::energy::{EnergyField, EnergyParams};
use crate::error::{FieldError, FieldResult};
use crate::grid::ScalarGrid;
use crate::sampler::FieldSampler;

/// What happened to one seeded box.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoxOutcome {
    Optimized(DescentReport),
    /// The descent raised an error; the box keeps its last accepted state.
    Failed { code: String, message: String },
}

impl BoxOutcome {
    pub fn hit_iteration_cap(&self) -> bool {
        matches!(self, BoxOutcome::Optimized(r) if r.termination == Termination::IterationCap)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BoxOutcome::Failed { .. })
    }
}

/// Optimize every box of `boxes` in place.
///
/// Above `parallel_threshold` boxes the descents run on the rayon pool,
/// each worker owning one slot of the list. The outcome at position `i`
/// belongs to box `i`.
pub fn expand_boxes(
    field: &EnergyField<'_>,
    boxes: &mut BoxList,
    parallel_threshold: usize,
    progress: Option<&ProgressCallback>,
) -> Vec<BoxOutcome> {
    let tracker = ProgressTracker::new("optimize_boxes", boxes.len() as u64);
    let optimize = |b: &mut Box3D| {
        let outcome = match field.gradient_descent(b, None) {
            Ok(report) => BoxOutcome::Optimized(report),
            Err(e) => BoxOutcome::Failed {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        };
        tracker.finish_one(progress);
        outcome
    };

    if boxes.len() > parallel_threshold {
        debug!(boxes = boxes.len(), "Optimizing boxes in parallel");
        boxes.as_mut_slice().par_iter_mut().map(optimize).collect()
    } else {
        boxes.iter_mut().map(optimize).collect()
    }
}

/// Whether an orientation finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrientationStatus {
    Completed,
    Failed { code: String, message: String },
}

/// Summary of one orientation run.
#[derive(Debug, Clone, Serialize)]
pub struct OrientationReport {
    pub index: usize,
    pub target: Direction,
    /// Row-major rotation applied to the mesh.
    pub rotation: [[f64; 3]; 3],
    pub status: OrientationStatus,
    pub seeded: usize,
    pub frozen_nodes: usize,
    /// Indices within this orientation's list that hit the iteration cap.
    pub non_converged: Vec<usize>,
    /// Indices within this orientation's list whose descent raised an error.
    pub failed_boxes: Vec<usize>,
    pub sample_ms: f64,
    pub build_ms: f64,
    pub optimize_ms: f64,
}

impl OrientationReport {
    fn new(index: usize, rotation: &Matrix3<f64>) -> Self {
        Self {
            index,
            target: orientation_target(index),
            rotation: std::array::from_fn(|r| std::array::from_fn(|c| rotation[(r, c)])),
            status: OrientationStatus::Completed,
            seeded: 0,
            frozen_nodes: 0,
            non_converged: Vec::new(),
            failed_boxes: Vec::new(),
            sample_ms: 0.0,
            build_ms: 0.0,
            optimize_ms: 0.0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrientationStatus::Completed
    }
}

struct OrientationRun {
    report: OrientationReport,
    boxes: BoxList,
    outcomes: Vec<BoxOutcome>,
    grid: Option<ScalarGrid>,
}

/// Output of [`FabricationEngine::run`].
#[derive(Debug)]
pub struct FabricationResult {
    /// All boxes, orientation 0 first.
    pub boxes: BoxList,
    pub orientations: Vec<OrientationReport>,
    per_orientation: Vec<BoxList>,
    outcomes: Vec<BoxOutcome>,
    grids: Vec<Option<ScalarGrid>>,
    energy: EnergyParams,
}

impl FabricationResult {
    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Boxes produced by orientation `index`.
    pub fn orientation_boxes(&self, index: usize) -> Option<&BoxList> {
        self.per_orientation.get(index)
    }

    /// Outcome for merged box `index`.
    pub fn outcome(&self, index: usize) -> Option<&BoxOutcome> {
        self.outcomes.get(index)
    }

    /// Merged indices of boxes that hit the iteration cap.
    pub fn non_converged(&self) -> Vec<usize> {
        self.indices_where(BoxOutcome::hit_iteration_cap)
    }

    /// Merged indices of boxes whose descent raised an error.
    pub fn failed_boxes(&self) -> Vec<usize> {
        self.indices_where(BoxOutcome::is_failed)
    }

    fn indices_where(&self, pred: impl Fn(&BoxOutcome) -> bool) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| pred(o))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn failed_orientations(&self) -> impl Iterator<Item = &OrientationReport> {
        self.orientations.iter().filter(|r| !r.is_completed())
    }

    /// Grid of orientation `index`, when grids were kept.
    pub fn grid(&self, index: usize) -> Option<&ScalarGrid> {
        self.grids.get(index).and_then(Option::as_ref)
    }

    /// Energy of merged box `index` on its orientation's grid.
    ///
    /// `Ok(None)` when the grid was not kept.
    pub fn box_energy(&self, index: usize) -> FieldResult<Option<f64>> {
        let b = self.boxes.get(index)?;
        let mut offset = index;
        for (list, grid) in self.per_orientation.iter().zip(&self.grids) {
            if offset < list.len() {
                return match grid {
                    Some(grid) => EnergyField::with_params(grid, self.energy.clone())
                        .energy(b)
                        .map(Some),
                    None => Ok(None),
                };
            }
            offset -= list.len();
        }
        Ok(None)
    }

    /// Write the merged list.
    pub fn save(&self, path: &Path) -> FieldResult<()> {
        self.boxes.save(path)
    }

    /// Write each orientation's list as `orientation_<i>.bin` under `dir`.
    pub fn save_orientations(&self, dir: &Path) -> FieldResult<()> {
        fs::create_dir_all(dir).map_err(|e| FieldError::io_write(dir, e))?;
        for (i, list) in self.per_orientation.iter().enumerate() {
            list.save(&dir.join(format!("orientation_{i}.bin")))?;
        }
        Ok(())
    }
}

/// Runs the orientation pipeline with one sampler and one parameter set.
pub struct FabricationEngine {
    params: FabricationParams,
    sampler: Box<dyn FieldSampler>,
    progress: Option<ProgressCallback>,
}

impl FabricationEngine {
    pub fn new(sampler: impl FieldSampler + 'static) -> Self {
        Self::with_params(sampler, FabricationParams::default())
    }

    pub fn with_params(sampler: impl FieldSampler + 'static, params: FabricationParams) -> Self {
        Self {
            params,
            sampler: Box::new(sampler),
            progress: None,
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn params(&self) -> &FabricationParams {
        &self.params
    }

    pub fn sampler(&self) -> &dyn FieldSampler {
        self.sampler.as_ref()
    }

    /// Run every configured orientation on `mesh` and merge the results.
    pub fn run(&self, mesh: &Mesh) -> FieldResult<FabricationResult> {
        self.params.validate()?;
        if mesh.face_count() == 0 {
            return Err(FieldError::EmptyMesh {
                details: "mesh has no faces".into(),
            });
        }
        let _timer = PhaseTimer::with_items("fabricate", mesh.face_count());
        log_mesh_stats(mesh, "fabricate");
        let count = self.params.orientations;
        info!(
            faces = mesh.face_count(),
            orientations = count,
            sampler = self.sampler.name(),
            resolution = self.params.resolution,
            "Starting fabrication"
        );

        let runs: Vec<FieldResult<OrientationRun>> = if self.params.parallel_orientations {
            (0..count)
                .into_par_iter()
                .map(|i| self.run_orientation(mesh, i))
                .collect()
        } else {
            (0..count).map(|i| self.run_orientation(mesh, i)).collect()
        };

        let mut boxes = BoxList::new();
        let mut orientations = Vec::with_capacity(count);
        let mut per_orientation = Vec::with_capacity(count);
        let mut outcomes = Vec::new();
        let mut grids = Vec::with_capacity(count);

        for (i, run) in runs.into_iter().enumerate() {
            let run = match run {
                Ok(run) => run,
                Err(e) if e.is_environment_failure() => {
                    warn!(orientation = i, error = %e, "Orientation failed");
                    let mut report = OrientationReport::new(i, &orientation_rotation(i));
                    report.status = OrientationStatus::Failed {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    };
                    OrientationRun {
                        report,
                        boxes: BoxList::new(),
                        outcomes: Vec::new(),
                        grid: None,
                    }
                }
                Err(e) => return Err(e),
            };
            boxes.merge(&run.boxes);
            outcomes.extend(run.outcomes);
            orientations.push(run.report);
            per_orientation.push(run.boxes);
            grids.push(run.grid);
        }

        let result = FabricationResult {
            boxes,
            orientations,
            per_orientation,
            outcomes,
            grids,
            energy: self.params.energy.clone(),
        };
        info!(
            boxes = result.box_count(),
            non_converged = result.non_converged().len(),
            failed_orientations = result.failed_orientations().count(),
            "Fabrication finished"
        );
        Ok(result)
    }

    /// Load `input`, run, and write the merged list to `output`.
    pub fn run_file(&self, input: &Path, output: &Path) -> FieldResult<FabricationResult> {
        let mesh = Mesh::load(input)?;
        let result = self.run(&mesh)?;
        result.save(output)?;
        Ok(result)
    }

    fn run_orientation(&self, mesh: &Mesh, index: usize) -> FieldResult<OrientationRun> {
        let params = &self.params;
        let rotation = orientation_rotation(index);
        let target = orientation_target(index);
        let mut report = OrientationReport::new(index, &rotation);

        // Prepare
        let mut working = mesh.clone();
        scale_to_resolution(&mut working, params.resolution)?;
        working.transform(&rotation);

        // Sample
        let timer = PhaseTimer::new("sample_field");
        let data = {
            let scratch = tempfile::Builder::new()
                .prefix(&format!("boxfab-orientation-{index}-"))
                .tempdir()
                .map_err(|e| {
                    FieldError::sampler_unavailable(format!("cannot create scratch directory: {e}"))
                })?;
            let mesh_path = scratch.path().join(format!("orientation_{index}.obj"));
            save_obj(&working, &mesh_path)?;
            self.sampler.sample_field(&mesh_path)?
        };
        report.sample_ms = timer.elapsed_ms();
        drop(timer);

        // Build field
        let timer = PhaseTimer::new("build_field");
        let mut grid = ScalarGrid::from_grid_data(data)?;
        grid.calculate_weights(&working, target, &params.weights)?;
        let freeze = grid.freeze_kernel(&working, params.kernel_distance)?;
        report.frozen_nodes = freeze.frozen_nodes;
        report.build_ms = timer.elapsed_ms();
        drop(timer);

        // Seed and optimize
        let restrict = params.restrict_to_target.then_some(target);
        let mut boxes = seed_boxes(&working, &rotation, restrict)?;
        report.seeded = boxes.len();

        let timer = PhaseTimer::with_items("optimize_boxes", boxes.len());
        let field = EnergyField::with_params(&grid, params.energy.clone())
            .with_descent(params.descent.clone());
        let outcomes = expand_boxes(
            &field,
            &mut boxes,
            params.parallel_threshold,
            self.progress.as_ref(),
        );
        report.optimize_ms = timer.elapsed_ms();
        drop(timer);

        for (i, outcome) in outcomes.iter().enumerate() {
            if outcome.hit_iteration_cap() {
                report.non_converged.push(i);
            }
            if outcome.is_failed() {
                report.failed_boxes.push(i);
            }
        }
        info!(
            orientation = index,
            direction = %target,
            seeded = report.seeded,
            frozen_nodes = report.frozen_nodes,
            non_converged = report.non_converged.len(),
            failed = report.failed_boxes.len(),
            "Orientation finished"
        );

        Ok(OrientationRun {
            report,
            boxes,
            outcomes,
            grid: params.keep_grids.then_some(grid),
        })
    }
}

impl std::fmt::Debug for FabricationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricationEngine")
            .field("params", &self.params)
            .field("sampler", &self.sampler.name())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descent::DescentParams;
    use crate::grid::GridData;
    use crate::sampler::SdfSampler;
    use boxfab_mesh::Vertex;
    use nalgebra::Point3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cube(size: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..8 {
            let x = if i & 1 != 0 { size } else { 0.0 };
            let y = if i & 2 != 0 { size } else { 0.0 };
            let z = if i & 4 != 0 { size } else { 0.0 };
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces.extend([
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ]);
        mesh
    }

    fn small_params() -> FabricationParams {
        FabricationParams {
            resolution: 4,
            descent: DescentParams {
                max_iterations: 50,
                ..Default::default()
            },
            keep_grids: true,
            ..Default::default()
        }
    }

    struct FailingSampler;

    impl FieldSampler for FailingSampler {
        fn sample_field(&self, _: &Path) -> FieldResult<GridData> {
            Err(FieldError::sampler_unavailable("offline"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Fails on every second call.
    struct FlakySampler {
        calls: AtomicUsize,
        inner: SdfSampler,
    }

    impl FieldSampler for FlakySampler {
        fn sample_field(&self, path: &Path) -> FieldResult<GridData> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(FieldError::malformed("truncated"));
            }
            self.inner.sample_field(path)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_run_produces_boxes_for_every_orientation() {
        let engine = FabricationEngine::with_params(SdfSampler::default(), small_params());
        let result = engine.run(&cube(1.0)).unwrap();

        assert_eq!(result.orientations.len(), 6);
        assert!(result.orientations.iter().all(|r| r.is_completed()));
        let total: usize = (0..6)
            .map(|i| result.orientation_boxes(i).unwrap().len())
            .sum();
        assert_eq!(total, result.box_count());
        assert!(result.box_count() > 0);

        // Orientation 0 faces only its own target.
        for b in result.orientation_boxes(0).unwrap() {
            assert_eq!(b.target(), Direction::PosX);
            assert!(b.contains_constraints());
        }
        assert!(result.box_energy(0).unwrap().is_some());
    }

    #[test]
    fn test_merge_follows_orientation_order() {
        let engine = FabricationEngine::with_params(SdfSampler::default(), small_params());
        let result = engine.run(&cube(1.0)).unwrap();
        let mut expected = BoxList::new();
        for i in 0..6 {
            expected.merge(result.orientation_boxes(i).unwrap());
        }
        assert_eq!(result.boxes, expected);
    }

    #[test]
    fn test_sampler_failures_stay_in_their_orientation() {
        let sampler = FlakySampler {
            calls: AtomicUsize::new(0),
            inner: SdfSampler::default(),
        };
        let engine = FabricationEngine::with_params(sampler, small_params());
        let result = engine.run(&cube(1.0)).unwrap();

        let failed: Vec<usize> = result.failed_orientations().map(|r| r.index).collect();
        assert_eq!(failed, vec![1, 3, 5]);
        for i in failed {
            assert!(result.orientation_boxes(i).unwrap().is_empty());
        }
        assert!(!result.orientation_boxes(0).unwrap().is_empty());
    }

    #[test]
    fn test_all_orientations_failing_is_not_fatal() {
        let engine = FabricationEngine::with_params(FailingSampler, small_params());
        let result = engine.run(&cube(1.0)).unwrap();
        assert_eq!(result.box_count(), 0);
        assert_eq!(result.failed_orientations().count(), 6);
    }

    #[test]
    fn test_contract_errors_abort() {
        let engine = FabricationEngine::with_params(
            SdfSampler::default(),
            FabricationParams {
                orientations: 0,
                ..small_params()
            },
        );
        assert!(matches!(
            engine.run(&cube(1.0)),
            Err(FieldError::InvalidParams { .. })
        ));
        assert!(matches!(
            FabricationEngine::new(SdfSampler::default()).run(&Mesh::new()),
            Err(FieldError::EmptyMesh { .. })
        ));
    }

    #[test]
    fn test_parallel_orientations_match_sequential() {
        let sequential = FabricationEngine::with_params(SdfSampler::default(), small_params())
            .run(&cube(1.0))
            .unwrap();
        let parallel = FabricationEngine::with_params(
            SdfSampler::default(),
            FabricationParams {
                parallel_orientations: true,
                parallel_threshold: 0,
                ..small_params()
            },
        )
        .run(&cube(1.0))
        .unwrap();
        assert_eq!(sequential.boxes, parallel.boxes);
    }

    #[test]
    fn test_expand_boxes_reports_progress_and_isolates_failures() {
        let grid =
            ScalarGrid::from_fn([9, 9, 9], [0, 0, 0], [8, 8, 8], |p| (p.x - 4.0).powi(2) * 0.1)
                .unwrap();
        let field = EnergyField::new(&grid);
        let mut boxes: BoxList = (0..12)
            .map(|i| {
                let x = 1.0 + 0.2 * i as f64;
                Box3D::new(Point3::new(x, 2.0, 2.0), Point3::new(x + 2.0, 5.0, 5.0)).unwrap()
            })
            .collect();
        // Outside the grid: its descent fails without touching the others.
        boxes.push(Box3D::new(Point3::new(7.0, 7.0, 7.0), Point3::new(9.0, 9.0, 9.0)).unwrap());

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |p| {
            counter.fetch_max(p.done as usize, Ordering::SeqCst);
        });
        let outcomes = expand_boxes(&field, &mut boxes, 4, Some(&callback));

        assert_eq!(outcomes.len(), 13);
        assert!(outcomes[12].is_failed());
        assert!(outcomes[..12].iter().all(|o| !o.is_failed()));
        assert_eq!(seen.load(Ordering::SeqCst), 13);
    }
}
