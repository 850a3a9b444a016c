//! Error types for field construction, box geometry and serialization.
//!
//! Codes follow the pattern `FIELD-XXXX`:
//! - `FIELD-1xxx`: geometry and domain contract violations
//! - `FIELD-2xxx`: sampler failures (environment)
//! - `FIELD-3xxx`: serialization format errors
//! - `FIELD-4xxx`: IO and configuration errors
//!
//! Failing to converge is not an error; see [`crate::Termination`].

use boxfab_mesh::MeshError;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for field operations.
pub type FieldResult<T> = Result<T, FieldError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// FIELD-1001: Box with `min >= max` on some axis, or non-finite coordinates
    Geometry = 1001,
    /// FIELD-1002: Constraint slot outside 1..=3
    InvalidConstraintIndex = 1002,
    /// FIELD-1003: Box index outside the list
    IndexOutOfRange = 1003,
    /// FIELD-1004: Sample point outside the grid bounds
    OutOfDomain = 1004,
    /// FIELD-1005: Mesh without usable faces
    EmptyMesh = 1005,
    /// FIELD-2001: Sampler could not run or produced nothing
    SamplerUnavailable = 2001,
    /// FIELD-2002: Sampler output is truncated or inconsistent
    MalformedData = 2002,
    /// FIELD-3001: Unexpected byte count or shape while deserializing
    SerializationFormat = 3001,
    /// FIELD-4001: Failed to read a file
    IoRead = 4001,
    /// FIELD-4002: Failed to write a file
    IoWrite = 4002,
    /// FIELD-4003: Parameters out of range or unparseable
    InvalidParams = 4003,
    /// FIELD-4004: Mesh IO or validation failure
    Mesh = 4004,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `FIELD-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Geometry => "FIELD-1001",
            ErrorCode::InvalidConstraintIndex => "FIELD-1002",
            ErrorCode::IndexOutOfRange => "FIELD-1003",
            ErrorCode::OutOfDomain => "FIELD-1004",
            ErrorCode::EmptyMesh => "FIELD-1005",
            ErrorCode::SamplerUnavailable => "FIELD-2001",
            ErrorCode::MalformedData => "FIELD-2002",
            ErrorCode::SerializationFormat => "FIELD-3001",
            ErrorCode::IoRead => "FIELD-4001",
            ErrorCode::IoWrite => "FIELD-4002",
            ErrorCode::InvalidParams => "FIELD-4003",
            ErrorCode::Mesh => "FIELD-4004",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an error should be handled by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller broke a contract. Fail fast.
    Contract,
    /// The outside world failed (sampler, files). Isolate per orientation.
    Environment,
    /// Bad parameters or config files.
    Configuration,
}

/// Errors raised by the field engine.
#[derive(Debug, Error, Diagnostic)]
pub enum FieldError {
    #[error("invalid box geometry: {details}")]
    #[diagnostic(
        code(field::geometry),
        help("A box needs min < max on every axis and finite coordinates")
    )]
    Geometry { details: String },

    #[error("constraint index {index} is out of range (expected 1, 2 or 3)")]
    #[diagnostic(code(field::geometry::constraint))]
    InvalidConstraintIndex { index: usize },

    #[error("box index {index} is out of range for a list of {len} boxes")]
    #[diagnostic(code(field::geometry::index))]
    IndexOutOfRange { index: usize, len: usize },

    #[error(
        "point ({:.4}, {:.4}, {:.4}) is outside the grid domain [{:?}, {:?}]",
        .point[0], .point[1], .point[2], .bounds_min, .bounds_max
    )]
    #[diagnostic(
        code(field::domain),
        help("Keep boxes inside the sampled grid, or sample a larger domain")
    )]
    OutOfDomain {
        point: [f64; 3],
        bounds_min: [i32; 3],
        bounds_max: [i32; 3],
    },

    #[error("mesh has no usable faces: {details}")]
    #[diagnostic(code(field::mesh::empty))]
    EmptyMesh { details: String },

    #[error("field sampler unavailable: {details}")]
    #[diagnostic(
        code(field::sampler::unavailable),
        help("Check that the sampler program exists, is executable and writes <mesh>.bin")
    )]
    SamplerUnavailable { details: String },

    #[error("malformed grid data: {details}")]
    #[diagnostic(
        code(field::sampler::malformed),
        help("The sampler output is truncated or its header does not match its payload")
    )]
    MalformedData { details: String },

    #[error("unexpected serialized data: {details}")]
    #[diagnostic(code(field::serialization))]
    SerializationFormat { details: String },

    #[error("failed to read {path}")]
    #[diagnostic(code(field::io::read))]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    #[diagnostic(code(field::io::write), help("Check that the directory exists and is writable"))]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameters: {details}")]
    #[diagnostic(code(field::params))]
    InvalidParams { details: String },

    #[error("mesh operation failed: {0}")]
    #[diagnostic(code(field::mesh))]
    Mesh(#[from] MeshError),
}

impl FieldError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FieldError::Geometry { .. } => ErrorCode::Geometry,
            FieldError::InvalidConstraintIndex { .. } => ErrorCode::InvalidConstraintIndex,
            FieldError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            FieldError::OutOfDomain { .. } => ErrorCode::OutOfDomain,
            FieldError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            FieldError::SamplerUnavailable { .. } => ErrorCode::SamplerUnavailable,
            FieldError::MalformedData { .. } => ErrorCode::MalformedData,
            FieldError::SerializationFormat { .. } => ErrorCode::SerializationFormat,
            FieldError::IoRead { .. } => ErrorCode::IoRead,
            FieldError::IoWrite { .. } => ErrorCode::IoWrite,
            FieldError::InvalidParams { .. } => ErrorCode::InvalidParams,
            FieldError::Mesh(_) => ErrorCode::Mesh,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FieldError::SamplerUnavailable { .. } | FieldError::MalformedData { .. } => {
                ErrorCategory::Environment
            }
            FieldError::InvalidParams { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::Contract,
        }
    }

    /// True for failures the orchestrator absorbs per orientation.
    pub fn is_environment_failure(&self) -> bool {
        self.category() == ErrorCategory::Environment
    }

    pub fn geometry(details: impl Into<String>) -> Self {
        FieldError::Geometry {
            details: details.into(),
        }
    }

    pub fn sampler_unavailable(details: impl Into<String>) -> Self {
        FieldError::SamplerUnavailable {
            details: details.into(),
        }
    }

    pub fn malformed(details: impl Into<String>) -> Self {
        FieldError::MalformedData {
            details: details.into(),
        }
    }

    pub fn serialization(details: impl Into<String>) -> Self {
        FieldError::SerializationFormat {
            details: details.into(),
        }
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        FieldError::InvalidParams {
            details: details.into(),
        }
    }

    pub(crate) fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FieldError::IoRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FieldError::IoWrite {
            path: path.into(),
            source,
        }
    }
}
