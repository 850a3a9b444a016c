//! Subcommand implementations.

pub mod config;
pub mod energy;
pub mod fabricate;
pub mod grid;
pub mod info;
pub mod minimize;
pub mod seed;

use std::path::Path;

use anyhow::{Context, Result};
use boxfab_field::{EnergyField, FabricationParams, ScalarGrid};

/// Parameters from `--config`, or the defaults. Always validated.
pub(crate) fn load_params(config: Option<&Path>) -> Result<FabricationParams> {
    let params = match config {
        Some(path) => FabricationParams::from_file(path)
            .with_context(|| format!("Failed to load parameters from {:?}", path))?,
        None => FabricationParams::default(),
    };
    params.validate()?;
    Ok(params)
}

/// The energy field a fabrication run with `params` would build on `grid`.
pub(crate) fn field_for<'g>(grid: &'g ScalarGrid, params: &FabricationParams) -> EnergyField<'g> {
    EnergyField::with_params(grid, params.energy.clone()).with_descent(params.descent.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_config() {
        assert_eq!(load_params(None).unwrap(), FabricationParams::default());
    }

    #[test]
    fn test_config_reaches_energy_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "[energy]\ntarget_face_factor = 3.0\n\n[weights]\nfalloff = 2.5\n\n[descent]\nmax_iterations = 7\n",
        )
        .unwrap();

        let params = load_params(Some(&path)).unwrap();
        assert_eq!(params.weights.falloff, 2.5);

        let grid = ScalarGrid::from_fn([3, 3, 3], [0, 0, 0], [2, 2, 2], |_| 1.0).unwrap();
        let field = field_for(&grid, &params);
        assert_eq!(field.params().target_face_factor, 3.0);
        assert_eq!(field.descent_params().max_iterations, 7);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "resolution = 1\n").unwrap();
        assert!(load_params(Some(&path)).is_err());
    }
}
