//! Tracing helpers shared by the boxfab crates.
//!
//! The libraries only emit events. The `boxfab` binary installs the
//! subscriber, and `RUST_LOG=boxfab_field=debug` turns on per-box detail.
//!
//! INFO carries run and orientation summaries, DEBUG carries phase
//! boundaries and per-box results, TRACE carries individual descent steps.

use std::time::Instant;
use tracing::{debug, info};

/// Logs how long a pipeline phase took once it goes out of scope.
///
/// ```rust,ignore
/// let timer = PhaseTimer::new("sample_field");
/// let grid = sampler.sample(&mesh)?;
/// report.sample_ms = timer.elapsed_ms();
/// ```
pub struct PhaseTimer {
    phase: &'static str,
    items: Option<usize>,
    start: Instant,
}

impl PhaseTimer {
    pub fn new(phase: &'static str) -> Self {
        debug!(target: "boxfab::timing", phase, "Phase started");
        Self {
            phase,
            items: None,
            start: Instant::now(),
        }
    }

    /// Timer for a phase that processes `items` faces, boxes or nodes.
    pub fn with_items(phase: &'static str, items: usize) -> Self {
        debug!(target: "boxfab::timing", phase, items, "Phase started");
        Self {
            phase,
            items: Some(items),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1e3
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        let elapsed_ms = format!("{:.2}", self.elapsed_ms());
        match self.items {
            Some(items) => info!(
                target: "boxfab::timing",
                phase = self.phase,
                items,
                elapsed_ms,
                "Phase finished"
            ),
            None => info!(
                target: "boxfab::timing",
                phase = self.phase,
                elapsed_ms,
                "Phase finished"
            ),
        }
    }
}

/// Debug-log the size and extent of a mesh entering the pipeline.
pub fn log_mesh_stats(mesh: &crate::Mesh, context: &str) {
    let Some((min, max)) = mesh.bounds() else {
        debug!(target: "boxfab::mesh", context, "Mesh has no vertices");
        return;
    };
    let extent = max - min;
    debug!(
        target: "boxfab::mesh",
        context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        extent = format!("{:.3} x {:.3} x {:.3}", extent.x, extent.y, extent.z),
        "Mesh loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mesh;

    #[test]
    fn test_phase_timer_measures() {
        let timer = PhaseTimer::with_items("optimize_boxes", 3);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5.0);
    }

    #[test]
    fn test_mesh_stats_on_empty_mesh() {
        log_mesh_stats(&Mesh::new(), "empty");
    }
}
