//! Run configuration for the fabrication engine.
//!
//! Parameters round-trip through JSON and TOML so a run can be repeated
//! from a saved file:
//!
//! ```toml
//! resolution = 50
//! kernel_distance = 0.5
//! restrict_to_target = true
//!
//! [descent]
//! max_iterations = 500
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descent::DescentParams;
use crate::energy::EnergyParams;
use crate::error::{FieldError, FieldResult};
use crate::grid::WeightParams;

/// Number of canonical orientations.
pub const ORIENTATION_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricationParams {
    /// Half the largest extent of the prepared mesh, in grid units.
    pub resolution: u32,

    /// Frozen band thickness along the target axis, in grid units.
    pub kernel_distance: f64,

    /// Seed only faces whose closest direction is the orientation target.
    pub restrict_to_target: bool,

    /// Optimize boxes in parallel above this many seeds.
    pub parallel_threshold: usize,

    /// Run orientations concurrently.
    pub parallel_orientations: bool,

    /// Keep each orientation's grid in the result for later queries.
    pub keep_grids: bool,

    /// How many of the canonical orientations to run, starting at 0.
    pub orientations: usize,

    pub weights: WeightParams,
    pub energy: EnergyParams,
    pub descent: DescentParams,
}

impl Default for FabricationParams {
    fn default() -> Self {
        Self {
            resolution: 50,
            kernel_distance: 0.5,
            restrict_to_target: true,
            parallel_threshold: 10,
            parallel_orientations: false,
            keep_grids: false,
            orientations: ORIENTATION_COUNT,
            weights: WeightParams::default(),
            energy: EnergyParams::default(),
            descent: DescentParams::default(),
        }
    }
}

impl FabricationParams {
    /// Coarse grid and a short iteration budget, for previews.
    pub fn fast() -> Self {
        Self {
            resolution: 25,
            descent: DescentParams {
                max_iterations: 300,
                gradient_tolerance: 1e-4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Fine grid with a tight tolerance.
    pub fn high_quality() -> Self {
        Self {
            resolution: 100,
            descent: DescentParams {
                max_iterations: 5000,
                gradient_tolerance: 1e-8,
                min_step: 1e-5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> FieldResult<()> {
        if self.resolution < 2 {
            return Err(FieldError::invalid_params(format!(
                "resolution must be at least 2, got {}",
                self.resolution
            )));
        }
        if !(self.kernel_distance.is_finite() && self.kernel_distance >= 0.0) {
            return Err(FieldError::invalid_params(format!(
                "kernel_distance must be non-negative, got {}",
                self.kernel_distance
            )));
        }
        if !(1..=ORIENTATION_COUNT).contains(&self.orientations) {
            return Err(FieldError::invalid_params(format!(
                "orientations must be between 1 and {ORIENTATION_COUNT}, got {}",
                self.orientations
            )));
        }
        self.weights.validate()?;
        self.energy.validate()?;
        self.descent.validate()
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FieldError::invalid_params(format!("bad JSON config: {e}")))
    }

    pub fn to_json(&self) -> FieldResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FieldError::invalid_params(format!("cannot encode config: {e}")))
    }

    pub fn from_toml(toml_str: &str) -> FieldResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| FieldError::invalid_params(format!("bad TOML config: {e}")))
    }

    pub fn to_toml(&self) -> FieldResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| FieldError::invalid_params(format!("cannot encode config: {e}")))
    }

    /// Load a config file, choosing JSON or TOML by extension (TOML otherwise).
    pub fn from_file(path: &Path) -> FieldResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| FieldError::io_read(path, e))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_toml(&contents)
        }
    }

    pub fn from_toml_file(path: &Path) -> FieldResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| FieldError::io_read(path, e))?;
        Self::from_toml(&contents)
    }

    pub fn save_toml(&self, path: &Path) -> FieldResult<()> {
        let contents = self.to_toml()?;
        fs::write(path, contents).map_err(|e| FieldError::io_write(path, e))
    }
}
