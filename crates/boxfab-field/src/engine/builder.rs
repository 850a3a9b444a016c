//! Fluent configuration of a [`FabricationEngine`].
//!
//! ```no_run
//! use boxfab_field::{EngineBuilder, ExternalSampler};
//! use boxfab_mesh::Mesh;
//!
//! let mesh = Mesh::load("part.obj").unwrap();
//! let engine = EngineBuilder::new()
//!     .resolution(40)
//!     .kernel_distance(0.5)
//!     .sampler(ExternalSampler::new("./grid_generator"))
//!     .build()
//!     .unwrap();
//! let result = engine.run(&mesh).unwrap();
//! result.save(std::path::Path::new("solutions.bin")).unwrap();
//! ```

use boxfab_mesh::progress::{Progress, ProgressCallback};

use super::{FabricationEngine, FabricationParams};
use crate::descent::DescentParams;
use crate::energy::EnergyParams;
use crate::error::FieldResult;
use crate::grid::WeightParams;
use crate::sampler::{FieldSampler, SdfSampler};

/// Builder for [`FabricationEngine`]. Uses the in-process SDF sampler
/// unless another one is set.
pub struct EngineBuilder {
    params: FabricationParams,
    sampler: Option<Box<dyn FieldSampler>>,
    progress: Option<ProgressCallback>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            params: FabricationParams::default(),
            sampler: None,
            progress: None,
        }
    }

    /// Start from a full parameter set.
    pub fn params(mut self, params: FabricationParams) -> Self {
        self.params = params;
        self
    }

    pub fn resolution(mut self, resolution: u32) -> Self {
        self.params.resolution = resolution;
        self
    }

    pub fn kernel_distance(mut self, distance: f64) -> Self {
        self.params.kernel_distance = distance;
        self
    }

    /// Seed every face in every orientation instead of only faces facing
    /// the orientation's target.
    pub fn all_targets(mut self) -> Self {
        self.params.restrict_to_target = false;
        self
    }

    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.params.parallel_threshold = threshold;
        self
    }

    pub fn parallel_orientations(mut self, enable: bool) -> Self {
        self.params.parallel_orientations = enable;
        self
    }

    pub fn keep_grids(mut self, keep: bool) -> Self {
        self.params.keep_grids = keep;
        self
    }

    pub fn orientations(mut self, count: usize) -> Self {
        self.params.orientations = count;
        self
    }

    pub fn weights(mut self, weights: WeightParams) -> Self {
        self.params.weights = weights;
        self
    }

    pub fn energy(mut self, energy: EnergyParams) -> Self {
        self.params.energy = energy;
        self
    }

    pub fn descent(mut self, descent: DescentParams) -> Self {
        self.params.descent = descent;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.params.descent.max_iterations = iterations;
        self
    }

    /// Coarse grid and short descents. See [`FabricationParams::fast`].
    pub fn fast(mut self) -> Self {
        let preset = FabricationParams::fast();
        self.params.resolution = preset.resolution;
        self.params.descent = preset.descent;
        self
    }

    /// Fine grid and tight tolerances. See [`FabricationParams::high_quality`].
    pub fn high_quality(mut self) -> Self {
        let preset = FabricationParams::high_quality();
        self.params.resolution = preset.resolution;
        self.params.descent = preset.descent;
        self
    }

    pub fn sampler(mut self, sampler: impl FieldSampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Called from worker threads as boxes finish.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Validate the parameters and build the engine.
    pub fn build(self) -> FieldResult<FabricationEngine> {
        self.params.validate()?;
        let sampler: Box<dyn FieldSampler> = match self.sampler {
            Some(sampler) => sampler,
            None => Box::new(SdfSampler::default()),
        };
        Ok(FabricationEngine {
            params: self.params,
            sampler,
            progress: self.progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;

    #[test]
    fn test_builder_sets_params() {
        let engine = EngineBuilder::new()
            .resolution(30)
            .kernel_distance(1.5)
            .all_targets()
            .max_iterations(12)
            .build()
            .unwrap();
        let params = engine.params();
        assert_eq!(params.resolution, 30);
        assert_eq!(params.kernel_distance, 1.5);
        assert!(!params.restrict_to_target);
        assert_eq!(params.descent.max_iterations, 12);
        assert_eq!(engine.sampler().name(), "sdf");
    }

    #[test]
    fn test_builder_rejects_bad_params() {
        let err = EngineBuilder::new().kernel_distance(-1.0).build().unwrap_err();
        assert!(matches!(err, FieldError::InvalidParams { .. }));
    }
}
