//! Saving and restoring a prepared grid.
//!
//! Layout, little-endian:
//! `b"BXGRID01"`, bounds_min (3 x i32), bounds_max (3 x i32),
//! resolution (3 x i32), target index (u8), kernel distance (f64),
//! distances (N x f64), weights (N x f64), frozen flags (N x u8).

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use super::ScalarGrid;
use super::data::GridData;
use crate::codec::{read_bytes, read_f64, read_f64_vec, read_i32x3, write_f64s, write_i32s};
use crate::direction::Direction;
use crate::error::{FieldError, FieldResult};

const MAGIC: &[u8; 8] = b"BXGRID01";

impl ScalarGrid {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        write_i32s(w, &self.bounds_min)?;
        write_i32s(w, &self.bounds_max)?;
        write_i32s(w, &self.resolution.map(|n| n as i32))?;
        w.write_all(&[self.target.index() as u8])?;
        write_f64s(w, &[self.kernel_distance])?;
        write_f64s(w, &self.distances)?;
        write_f64s(w, &self.values)?;
        let flags: Vec<u8> = self.frozen.iter().map(|&f| u8::from(f)).collect();
        w.write_all(&flags)
    }

    /// Parse a saved grid. The input must contain exactly one grid.
    pub fn from_bytes(bytes: &[u8]) -> FieldResult<Self> {
        let mut r = bytes;
        let fmt = |e: io::Error| FieldError::serialization(format!("grid: {e}"));

        let magic: [u8; 8] = read_bytes(&mut r).map_err(fmt)?;
        if &magic != MAGIC {
            return Err(FieldError::serialization("grid: bad magic"));
        }
        let bounds_min = read_i32x3(&mut r).map_err(fmt)?;
        let bounds_max = read_i32x3(&mut r).map_err(fmt)?;
        let raw_res = read_i32x3(&mut r).map_err(fmt)?;
        let [target_index] = read_bytes::<_, 1>(&mut r).map_err(fmt)?;
        let kernel_distance = read_f64(&mut r).map_err(fmt)?;

        let target = Direction::from_index(target_index as usize).ok_or_else(|| {
            FieldError::serialization(format!("grid: unknown target index {target_index}"))
        })?;
        if raw_res.iter().any(|&n| n < 2) {
            return Err(FieldError::serialization(format!(
                "grid: bad resolution {raw_res:?}"
            )));
        }
        let resolution = raw_res.map(|n| n as usize);
        let n = resolution[0]
            .checked_mul(resolution[1])
            .and_then(|v| v.checked_mul(resolution[2]))
            .ok_or_else(|| FieldError::serialization("grid: node count overflows"))?;
        let expected = n.checked_mul(17).unwrap_or(usize::MAX);
        if r.len() != expected {
            return Err(FieldError::serialization(format!(
                "grid: payload is {} bytes, expected {expected}",
                r.len()
            )));
        }

        let distances = read_f64_vec(&mut r, n).map_err(fmt)?;
        let values = read_f64_vec(&mut r, n).map_err(fmt)?;
        let mut flags = vec![0u8; n];
        r.read_exact(&mut flags).map_err(fmt)?;

        let mut grid = ScalarGrid::from_grid_data(GridData {
            bounds_min,
            bounds_max,
            resolution,
            values: distances,
            weights: Some(values),
        })
        .map_err(|e| FieldError::serialization(format!("grid: {e}")))?;

        grid.target = target;
        grid.kernel_distance = kernel_distance;
        grid.frozen = flags.iter().map(|&f| f != 0).collect();
        grid.frozen_count = grid.frozen.iter().filter(|&&f| f).count();
        Ok(grid)
    }

    /// Replace this grid with a parsed one. On error `self` is unchanged.
    pub fn deserialize_into(&mut self, bytes: &[u8]) -> FieldResult<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    pub fn save(&self, path: &Path) -> FieldResult<()> {
        fs::write(path, self.to_bytes()).map_err(|e| FieldError::io_write(path, e))
    }

    pub fn load(path: &Path) -> FieldResult<Self> {
        let bytes = fs::read(path).map_err(|e| FieldError::io_read(path, e))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxfab_mesh::{Mesh, Vertex};

    fn slab() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 2.0));
        mesh.vertices.push(Vertex::from_coords(4.0, 0.0, 2.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 4.0, 2.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    fn prepared_grid() -> ScalarGrid {
        let mut grid =
            ScalarGrid::from_fn([5, 5, 5], [0, 0, 0], [4, 4, 4], |p| p.z - 2.0).unwrap();
        grid.calculate_weights(&slab(), Direction::NegY, &Default::default())
            .unwrap();
        grid.set_target(Direction::PosZ);
        grid.freeze_kernel(&slab(), 1.0).unwrap();
        grid
    }

    #[test]
    fn test_grid_state_roundtrip() {
        let grid = prepared_grid();
        assert!(grid.frozen_count() > 0);
        let restored = ScalarGrid::from_bytes(&grid.to_bytes()).unwrap();
        assert_eq!(restored, grid);
    }

    #[test]
    fn test_bad_input_leaves_grid_unchanged() {
        let mut grid = prepared_grid();
        let before = grid.clone();
        let mut bytes = before.to_bytes();
        bytes.pop();
        assert!(matches!(
            grid.deserialize_into(&bytes),
            Err(FieldError::SerializationFormat { .. })
        ));
        assert_eq!(grid, before);

        let err = grid.deserialize_into(b"NOTAGRID").unwrap_err();
        assert!(matches!(err, FieldError::SerializationFormat { .. }));
        assert_eq!(grid, before);
    }
}
