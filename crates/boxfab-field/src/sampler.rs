//! Field samplers: turn a mesh file into [`GridData`].
//!
//! [`ExternalSampler`] runs a grid generator program in a private scratch
//! directory. [`SdfSampler`] computes the signed distance in-process with
//! `mesh_to_sdf`.

use std::path::{Path, PathBuf};
use std::process::Command;

use boxfab_mesh::{Mesh, load_mesh, save_obj};
use mesh_to_sdf::{Grid, SignMethod, Topology, generate_grid_sdf};
use tracing::{debug, info, warn};

use crate::error::{FieldError, FieldResult};
use crate::grid::GridData;

/// Produces a sampled scalar field for a mesh file.
///
/// Implementations are shared across orientation runs, so they must not
/// keep per-call state.
pub trait FieldSampler: Send + Sync {
    fn sample_field(&self, mesh_path: &Path) -> FieldResult<GridData>;

    /// Short name used in logs and reports.
    fn name(&self) -> &str;
}

/// Runs `program mesh.obj` and reads back `mesh.bin`.
///
/// Every call gets its own temporary directory holding the mesh copy, the
/// grid file and anything else the program writes. The directory is
/// removed when the call returns, on success and failure alike.
#[derive(Debug, Clone)]
pub struct ExternalSampler {
    program: PathBuf,
    args: Vec<String>,
}

const SCRATCH_STEM: &str = "mesh";

impl ExternalSampler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the mesh path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl FieldSampler for ExternalSampler {
    fn sample_field(&self, mesh_path: &Path) -> FieldResult<GridData> {
        let scratch = tempfile::Builder::new()
            .prefix("boxfab-sampler-")
            .tempdir()
            .map_err(|e| {
                FieldError::sampler_unavailable(format!("cannot create scratch directory: {e}"))
            })?;

        let mesh = load_mesh(mesh_path)?;
        let input = scratch.path().join(format!("{SCRATCH_STEM}.obj"));
        save_obj(&mesh, &input)?;

        debug!(
            program = %self.program.display(),
            scratch = %scratch.path().display(),
            "Invoking external sampler"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&input)
            .current_dir(scratch.path())
            .output()
            .map_err(|e| {
                FieldError::sampler_unavailable(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "External sampler failed");
            return Err(FieldError::sampler_unavailable(format!(
                "{} exited with {}",
                self.program.display(),
                output.status
            )));
        }

        let grid_path = scratch.path().join(format!("{SCRATCH_STEM}.bin"));
        if !grid_path.is_file() {
            return Err(FieldError::sampler_unavailable(format!(
                "{} produced no {}",
                self.program.display(),
                grid_path.display()
            )));
        }
        let data = GridData::load(&grid_path)?;
        info!(
            resolution = ?data.resolution,
            weights = data.weights.is_some(),
            "Read sampled field"
        );
        Ok(data)
    }

    fn name(&self) -> &str {
        "external"
    }
}

/// In-process signed-distance sampler on the integer lattice.
///
/// The grid spans the mesh bounds rounded outward to integers, widened by
/// `padding` nodes on every side, at unit spacing.
#[derive(Debug, Clone)]
pub struct SdfSampler {
    pub padding: i32,
}

impl Default for SdfSampler {
    fn default() -> Self {
        Self { padding: 3 }
    }
}

impl SdfSampler {
    pub fn new(padding: i32) -> Self {
        Self { padding }
    }

    /// Sample an in-memory mesh.
    pub fn sample_mesh(&self, mesh: &Mesh) -> FieldResult<GridData> {
        let (lo, hi) = mesh
            .bounds()
            .ok_or_else(|| FieldError::EmptyMesh {
                details: "cannot sample a mesh without vertices".into(),
            })?;
        let pad = self.padding.max(1);
        let to_i32 = |v: f64| -> FieldResult<i32> {
            if v.is_finite() && v.abs() < f64::from(i32::MAX / 2) {
                Ok(v as i32)
            } else {
                Err(FieldError::malformed(format!("mesh coordinate {v} out of range")))
            }
        };
        let mut bounds_min = [0i32; 3];
        let mut bounds_max = [0i32; 3];
        let padding_overflow =
            || FieldError::malformed(format!("padding {pad} overflows the grid bounds"));
        for a in 0..3 {
            bounds_min[a] = to_i32(lo[a].floor())?
                .checked_sub(pad)
                .ok_or_else(padding_overflow)?;
            bounds_max[a] = to_i32(hi[a].ceil())?
                .checked_add(pad)
                .ok_or_else(padding_overflow)?;
        }
        let resolution: [usize; 3] = std::array::from_fn(|a| {
            (i64::from(bounds_max[a]) - i64::from(bounds_min[a])) as usize + 1
        });

        let vertices: Vec<[f32; 3]> = mesh
            .vertices
            .iter()
            .map(|v| {
                [
                    v.position.x as f32,
                    v.position.y as f32,
                    v.position.z as f32,
                ]
            })
            .collect();
        let indices: Vec<u32> = mesh.faces.iter().flat_map(|f| f.iter().copied()).collect();

        // Cells are centered on the integer nodes.
        let grid = Grid::from_bounding_box(
            &bounds_min.map(|v| v as f32 - 0.5),
            &bounds_max.map(|v| v as f32 + 0.5),
            resolution,
        );
        let sdf = generate_grid_sdf(
            &vertices,
            Topology::TriangleList(Some(&indices)),
            &grid,
            SignMethod::Raycast,
        );

        let data = GridData {
            bounds_min,
            bounds_max,
            resolution,
            values: sdf.into_iter().map(f64::from).collect(),
            weights: None,
        };
        data.validate()?;
        info!(
            resolution = ?data.resolution,
            bounds_min = ?data.bounds_min,
            bounds_max = ?data.bounds_max,
            "Computed signed distance field"
        );
        Ok(data)
    }
}

impl FieldSampler for SdfSampler {
    fn sample_field(&self, mesh_path: &Path) -> FieldResult<GridData> {
        let mesh = load_mesh(mesh_path)?;
        self.sample_mesh(&mesh)
    }

    fn name(&self) -> &str {
        "sdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxfab_mesh::Vertex;

    fn tetra() -> Mesh {
        let mut mesh = Mesh::new();
        for (x, y, z) in [(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (0.0, 4.0, 0.0), (0.0, 0.0, 4.0)] {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces.extend([[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]]);
        mesh
    }

    #[test]
    fn test_sdf_sampler_lattice() {
        let data = SdfSampler::new(2).sample_mesh(&tetra()).unwrap();
        assert_eq!(data.bounds_min, [-2, -2, -2]);
        assert_eq!(data.bounds_max, [6, 6, 6]);
        assert_eq!(data.resolution, [9, 9, 9]);
        assert_eq!(data.values.len(), 729);

        // Node (3, 3, 3) is the grid corner at the origin, a surface vertex.
        let at = |i: usize, j: usize, k: usize| data.values[(i * 9 + j) * 9 + k];
        assert!(at(3, 3, 3).abs() < 1e-3);
        // Far corner is outside.
        assert!(at(8, 8, 8) > 0.0);
        // World point (1, 1, 1) is inside.
        assert!(at(4, 4, 4) < 0.0);
    }

    #[test]
    fn test_sdf_sampler_rejects_empty_mesh() {
        assert!(matches!(
            SdfSampler::default().sample_mesh(&Mesh::new()),
            Err(FieldError::EmptyMesh { .. })
        ));
    }

    #[test]
    fn test_sdf_sampler_rejects_overflowing_padding() {
        assert!(matches!(
            SdfSampler::new(i32::MAX).sample_mesh(&tetra()),
            Err(FieldError::MalformedData { .. })
        ));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tetra.obj");
        save_obj(&tetra(), &path).unwrap();

        let sampler = ExternalSampler::new(dir.path().join("no-such-generator"));
        let err = sampler.sample_field(&path).unwrap_err();
        assert!(matches!(err, FieldError::SamplerUnavailable { .. }));
        assert!(err.is_environment_failure());
    }
}
