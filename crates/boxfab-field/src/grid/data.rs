//! Raw sampler output.
//!
//! Layout, little-endian, no padding:
//!
//! | field        | type       |
//! |--------------|------------|
//! | bounds_min   | 3 x i32    |
//! | bounds_max   | 3 x i32    |
//! | resolution   | 3 x i32    |
//! | values       | N x f64    |
//! | weights      | N x f64, optional |
//!
//! with `N = nx * ny * nz`. Nodes are ordered row-major over (x, y, z), so z
//! varies fastest. Values are signed distances, negative inside the mesh.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::codec::{read_f64_vec, read_i32x3, write_f64s, write_i32s};
use crate::error::{FieldError, FieldResult};

const HEADER_BYTES: usize = 9 * 4;

/// Largest node count accepted from a file (about 2 GiB of doubles).
const MAX_NODES: usize = 1 << 28;

/// A discretized field as produced by a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct GridData {
    pub bounds_min: [i32; 3],
    pub bounds_max: [i32; 3],
    pub resolution: [usize; 3],
    pub values: Vec<f64>,
    /// Precomputed per-node weights, present in some sampler invocations.
    pub weights: Option<Vec<f64>>,
}

impl GridData {
    /// Expected number of nodes, `None` on overflow.
    pub fn node_count(&self) -> Option<usize> {
        node_count(self.resolution)
    }

    /// Check that the header is usable and the payload matches it.
    pub fn validate(&self) -> FieldResult<()> {
        check_header(self.bounds_min, self.bounds_max, self.resolution)?;
        let n = node_count(self.resolution)
            .ok_or_else(|| FieldError::malformed("node count overflows"))?;
        if self.values.len() != n {
            return Err(FieldError::malformed(format!(
                "expected {n} values, found {}",
                self.values.len()
            )));
        }
        if let Some(w) = &self.weights {
            if w.len() != n {
                return Err(FieldError::malformed(format!(
                    "expected {n} weights, found {}",
                    w.len()
                )));
            }
        }
        let mut all = self.values.iter().chain(self.weights.iter().flatten());
        if let Some(pos) = all.position(|v| !v.is_finite()) {
            return Err(FieldError::malformed(format!(
                "non-finite sample at position {pos}"
            )));
        }
        Ok(())
    }

    /// Parse a complete sampler file.
    ///
    /// Anything after the values must be exactly one weights column.
    pub fn from_bytes(bytes: &[u8]) -> FieldResult<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(FieldError::malformed(format!(
                "file is {} bytes, header needs {HEADER_BYTES}",
                bytes.len()
            )));
        }
        let mut r = bytes;
        let eof = |e: io::Error| FieldError::malformed(e.to_string());
        let bounds_min = read_i32x3(&mut r).map_err(eof)?;
        let bounds_max = read_i32x3(&mut r).map_err(eof)?;
        let raw_res = read_i32x3(&mut r).map_err(eof)?;

        if raw_res.iter().any(|&n| n < 0) {
            return Err(FieldError::malformed(format!(
                "negative resolution {raw_res:?}"
            )));
        }
        let resolution = raw_res.map(|n| n as usize);
        check_header(bounds_min, bounds_max, resolution)?;

        let n = node_count(resolution)
            .filter(|&n| n <= MAX_NODES)
            .ok_or_else(|| FieldError::malformed(format!("resolution {resolution:?} too large")))?;
        let column = n * 8;
        let payload = r.len();

        let has_weights = if payload == column {
            false
        } else if payload == 2 * column {
            true
        } else {
            return Err(FieldError::malformed(format!(
                "payload is {payload} bytes, expected {column} or {} for {n} nodes",
                2 * column
            )));
        };

        let values = read_f64_vec(&mut r, n).map_err(eof)?;
        let weights = if has_weights {
            Some(read_f64_vec(&mut r, n).map_err(eof)?)
        } else {
            None
        };

        let data = GridData {
            bounds_min,
            bounds_max,
            resolution,
            values,
            weights,
        };
        data.validate()?;
        Ok(data)
    }

    /// Read and parse a sampler file.
    pub fn load(path: &Path) -> FieldResult<Self> {
        let bytes = fs::read(path).map_err(|e| FieldError::io_read(path, e))?;
        Self::from_bytes(&bytes)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_i32s(w, &self.bounds_min)?;
        write_i32s(w, &self.bounds_max)?;
        let res = self.resolution.map(|n| n as i32);
        write_i32s(w, &res)?;
        write_f64s(w, &self.values)?;
        if let Some(weights) = &self.weights {
            write_f64s(w, weights)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_BYTES + self.values.len() * 16);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    pub fn save(&self, path: &Path) -> FieldResult<()> {
        fs::write(path, self.to_bytes()).map_err(|e| FieldError::io_write(path, e))
    }
}

fn node_count(res: [usize; 3]) -> Option<usize> {
    res[0].checked_mul(res[1])?.checked_mul(res[2])
}

fn check_header(min: [i32; 3], max: [i32; 3], res: [usize; 3]) -> FieldResult<()> {
    if res.iter().any(|&n| n < 2) {
        return Err(FieldError::malformed(format!(
            "resolution {res:?} needs at least 2 nodes per axis"
        )));
    }
    if (0..3).any(|a| min[a] >= max[a]) {
        return Err(FieldError::malformed(format!(
            "bounds {min:?}..{max:?} are empty on some axis"
        )));
    }
    if (0..3).any(|a| max[a].checked_sub(min[a]).is_none()) {
        return Err(FieldError::malformed(format!(
            "bounds {min:?}..{max:?} span more than i32::MAX on some axis"
        )));
    }
    Ok(())
}
