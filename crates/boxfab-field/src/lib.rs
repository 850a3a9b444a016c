//! Volumetric energy fields and support box optimization.
//!
//! Given a triangle mesh, this crate samples a scalar field around it,
//! attaches a box to every face that looks toward one of six canonical
//! directions, and grows or shrinks each box by gradient descent on an
//! energy read from the field. Boxes never move a face onto the frozen
//! band near the surface and always keep holding the face they were
//! seeded from.
//!
//! # Pieces
//!
//! - [`ScalarGrid`]: regular grid of weights with trilinear and tricubic
//!   sampling, weight calculation and kernel freezing
//! - [`EnergyField`]: box energy, its analytic and finite-difference
//!   gradients, and [`EnergyField::gradient_descent`]
//! - [`Box3D`] and [`BoxList`]: the boxes and their binary format
//! - [`FieldSampler`]: where grids come from, either an external program
//!   ([`ExternalSampler`]) or in-process ([`SdfSampler`])
//! - [`FabricationEngine`]: runs the six orientations and merges the result
//!
//! # Example
//!
//! ```no_run
//! use boxfab_field::{FabricationEngine, FabricationParams, SdfSampler};
//! use boxfab_mesh::Mesh;
//!
//! let mesh = Mesh::load("part.stl").unwrap();
//! let engine = FabricationEngine::with_params(SdfSampler::default(), FabricationParams::fast());
//! let result = engine.run(&mesh).unwrap();
//!
//! println!("{} boxes", result.box_count());
//! for index in result.non_converged() {
//!     println!("box {index} hit the iteration cap");
//! }
//! ```
//!
//! # Coordinates
//!
//! Grid nodes live at integer-bounded positions `bounds_min + (i, j, k) *
//! spacing`, stored with z varying fastest. Box gradients are ordered
//! `(min.x, min.y, min.z, max.x, max.y, max.z)`.

mod box3d;
mod box_list;
mod codec;
mod descent;
mod direction;
mod energy;
mod error;

pub mod engine;
pub mod grid;
pub mod sampler;

pub use box_list::BoxList;
pub use box3d::{BOX_RECORD_BYTES, Box3D};
pub use descent::{DescentParams, DescentReport, FaceNodes, Termination};
pub use direction::{Axis, Color, Direction, closest_direction};
pub use energy::{EnergyField, EnergyParams};
pub use engine::{
    BoxOutcome, EngineBuilder, FabricationEngine, FabricationParams, FabricationResult,
    OrientationReport, OrientationStatus,
};
pub use error::{ErrorCategory, ErrorCode, FieldError, FieldResult};
pub use grid::{FreezeStats, GridData, ScalarGrid, WeightParams, WeightStats};
pub use sampler::{ExternalSampler, FieldSampler, SdfSampler};
