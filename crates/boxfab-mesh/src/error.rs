//! Errors raised while exchanging meshes with files and samplers.
//!
//! Codes are `MESH-XXXX`: `1xxx` for file access and parsing, `2xxx` for
//! geometry that cannot be handed to a field sampler.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type MeshResult<T> = Result<T, MeshError>;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    FileAccess = 1001,
    Parse = 1002,
    UnsupportedFormat = 1003,
    Empty = 2001,
    IndexOutOfRange = 2002,
    NonFinite = 2003,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MESH-{:04}", *self as u16)
    }
}

/// Direction of a failed file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileOp::Read => "read",
            FileOp::Write => "write",
        })
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    #[error("cannot {op} mesh file {path}")]
    #[diagnostic(code(mesh::file))]
    File {
        op: FileOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid mesh: {details}")]
    #[diagnostic(code(mesh::parse), help("Re-export the part as binary STL or OBJ"))]
    Parse { path: PathBuf, details: String },

    #[error("no mesh format for {path}")]
    #[diagnostic(code(mesh::format), help("Use a .stl or .obj extension"))]
    UnsupportedFormat { path: PathBuf },

    #[error("mesh is empty: {details}")]
    #[diagnostic(code(mesh::empty))]
    Empty { details: String },

    #[error("face {face} uses vertex {vertex} of {vertex_count}")]
    #[diagnostic(code(mesh::index))]
    IndexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    /// NaN or infinite coordinate. `axis` is 0, 1 or 2.
    #[error("vertex {vertex} has non-finite coordinate {value} on axis {axis}")]
    #[diagnostic(code(mesh::non_finite))]
    NonFinite { vertex: usize, axis: usize, value: f64 },
}

impl MeshError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::File { .. } => ErrorCode::FileAccess,
            MeshError::Parse { .. } => ErrorCode::Parse,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::Empty { .. } => ErrorCode::Empty,
            MeshError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            MeshError::NonFinite { .. } => ErrorCode::NonFinite,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::File {
            op: FileOp::Read,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::File {
            op: FileOp::Write,
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::Parse {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn empty(details: impl Into<String>) -> Self {
        MeshError::Empty {
            details: details.into(),
        }
    }
}
