//! Triangle meshes for support box fabrication.
//!
//! This crate holds the small amount of mesh machinery the field engine
//! needs: an indexed triangle mesh, STL/OBJ file IO, per-face normals and
//! corners, rigid and uniform transforms, and data validation.
//!
//! # Example
//!
//! ```no_run
//! use boxfab_mesh::Mesh;
//!
//! let mesh = Mesh::load("part.stl").unwrap();
//! for tri in mesh.triangles() {
//!     if let Some(n) = tri.normal() {
//!         println!("area {:.3}, normal {:?}", tri.area(), n);
//!     }
//! }
//! ```

mod error;
mod types;

pub mod io;
pub mod progress;
pub mod tracing_ext;
pub mod validate;

pub use error::{ErrorCode, FileOp, MeshError, MeshResult};
pub use io::{MeshFormat, load_mesh, save_mesh, save_obj, save_stl};
pub use types::{Mesh, Triangle, Vertex};
pub use validate::{MeshDataReport, validate_mesh_data};
