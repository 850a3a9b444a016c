//! Ordered box collections and their binary file format.
//!
//! A list is stored as a little-endian `u32` count followed by that many
//! [`Box3D`] records.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::box3d::{BOX_RECORD_BYTES, Box3D};
use crate::codec::read_u32;
use crate::error::{FieldError, FieldResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxList {
    boxes: Vec<Box3D>,
}

impl BoxList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            boxes: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn push(&mut self, b: Box3D) {
        self.boxes.push(b);
    }

    pub fn get(&self, index: usize) -> FieldResult<&Box3D> {
        let len = self.boxes.len();
        self.boxes
            .get(index)
            .ok_or(FieldError::IndexOutOfRange { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> FieldResult<&mut Box3D> {
        let len = self.boxes.len();
        self.boxes
            .get_mut(index)
            .ok_or(FieldError::IndexOutOfRange { index, len })
    }

    /// Replace the box at `index`.
    pub fn set(&mut self, index: usize, b: Box3D) -> FieldResult<()> {
        *self.get_mut(index)? = b;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> FieldResult<Box3D> {
        let len = self.boxes.len();
        if index >= len {
            return Err(FieldError::IndexOutOfRange { index, len });
        }
        Ok(self.boxes.remove(index))
    }

    /// Append every box of `other`, preserving both orders.
    pub fn merge(&mut self, other: &BoxList) {
        self.boxes.extend_from_slice(&other.boxes);
    }

    /// Append `other` by value.
    pub fn append(&mut self, mut other: BoxList) {
        self.boxes.append(&mut other.boxes);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Box3D> {
        self.boxes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Box3D> {
        self.boxes.iter_mut()
    }

    pub fn as_slice(&self) -> &[Box3D] {
        &self.boxes
    }

    pub fn as_mut_slice(&mut self) -> &mut [Box3D] {
        &mut self.boxes
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Size in bytes of the serialized form.
    pub fn encoded_len(&self) -> usize {
        4 + self.boxes.len() * BOX_RECORD_BYTES
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> FieldResult<()> {
        let count = u32::try_from(self.boxes.len()).map_err(|_| {
            FieldError::serialization(format!("{} boxes exceed the u32 count", self.boxes.len()))
        })?;
        let io = |e: io::Error| FieldError::serialization(format!("box list: {e}"));
        w.write_all(&count.to_le_bytes()).map_err(io)?;
        for b in &self.boxes {
            b.write_to(w).map_err(io)?;
        }
        Ok(())
    }

    /// Read a count-prefixed list from a stream. Trailing data is left unread.
    pub fn read_from<R: Read>(r: &mut R) -> FieldResult<Self> {
        let count = read_u32(r)
            .map_err(|e| FieldError::serialization(format!("box list count: {e}")))?
            as usize;
        // Cap the preallocation so a corrupt count cannot exhaust memory.
        let mut list = Self::with_capacity(count.min(1 << 16));
        for i in 0..count {
            let b = Box3D::read_from(r).map_err(|e| {
                FieldError::serialization(format!("box {i} of {count}: {e}"))
            })?;
            list.push(b);
        }
        Ok(list)
    }

    pub fn to_bytes(&self) -> FieldResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Parse a buffer holding exactly one list.
    pub fn from_bytes(bytes: &[u8]) -> FieldResult<Self> {
        if bytes.len() < 4 {
            return Err(FieldError::serialization(format!(
                "box list is {} bytes, shorter than its count",
                bytes.len()
            )));
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let expected = count
            .checked_mul(BOX_RECORD_BYTES)
            .and_then(|n| n.checked_add(4));
        if expected != Some(bytes.len()) {
            return Err(FieldError::serialization(format!(
                "box list declares {count} boxes but holds {} bytes",
                bytes.len()
            )));
        }
        let mut r = bytes;
        Self::read_from(&mut r)
    }

    /// Replace the contents with a parsed list. On error `self` is unchanged.
    pub fn deserialize_into(&mut self, bytes: &[u8]) -> FieldResult<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Write the list to `path`. The file is only touched once encoding succeeded.
    pub fn save(&self, path: &Path) -> FieldResult<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes).map_err(|e| FieldError::io_write(path, e))?;
        debug!(path = %path.display(), boxes = self.len(), "Saved box list");
        Ok(())
    }

    pub fn load(path: &Path) -> FieldResult<Self> {
        let bytes = fs::read(path).map_err(|e| FieldError::io_read(path, e))?;
        Self::from_bytes(&bytes)
    }
}

impl From<Vec<Box3D>> for BoxList {
    fn from(boxes: Vec<Box3D>) -> Self {
        Self { boxes }
    }
}

impl FromIterator<Box3D> for BoxList {
    fn from_iter<I: IntoIterator<Item = Box3D>>(iter: I) -> Self {
        Self {
            boxes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Box3D> for BoxList {
    fn extend<I: IntoIterator<Item = Box3D>>(&mut self, iter: I) {
        self.boxes.extend(iter);
    }
}

impl IntoIterator for BoxList {
    type Item = Box3D;
    type IntoIter = std::vec::IntoIter<Box3D>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}

impl<'a> IntoIterator for &'a BoxList {
    type Item = &'a Box3D;
    type IntoIter = std::slice::Iter<'a, Box3D>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use nalgebra::Point3;

    fn cube_at(x: f64) -> Box3D {
        Box3D::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0)).unwrap()
    }

    fn sample(n: usize) -> BoxList {
        (0..n).map(|i| cube_at(i as f64)).collect()
    }

    #[test]
    fn test_index_errors() {
        let mut list = sample(2);
        assert!(matches!(
            list.get(2),
            Err(FieldError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(list.set(5, cube_at(0.0)).is_err());
        assert!(list.remove(2).is_err());
        list.set(1, cube_at(9.0)).unwrap();
        assert_eq!(list.get(1).unwrap().min().x, 9.0);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = sample(2);
        let b: BoxList = (10..13).map(|i| cube_at(i as f64)).collect();
        a.merge(&b);
        let xs: Vec<f64> = a.iter().map(|b| b.min().x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_empty_list_is_count_only() {
        let bytes = BoxList::new().to_bytes().unwrap();
        assert_eq!(bytes, 0u32.to_le_bytes());
        assert!(BoxList::from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_keeps_metadata() {
        let mut list = sample(3);
        list.get_mut(1)
            .unwrap()
            .set_constraint(3, Point3::new(1.5, 0.5, 0.5))
            .unwrap();
        list.set(2, cube_at(2.0).with_target(Direction::NegY)).unwrap();

        let bytes = list.to_bytes().unwrap();
        assert_eq!(bytes.len(), list.encoded_len());
        assert_eq!(BoxList::from_bytes(&bytes).unwrap(), list);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let mut list = sample(2);
        let before = list.clone();
        let mut bytes = sample(3).to_bytes().unwrap();

        bytes.push(0);
        assert!(matches!(
            list.deserialize_into(&bytes),
            Err(FieldError::SerializationFormat { .. })
        ));
        bytes.truncate(bytes.len() - 2);
        assert!(list.deserialize_into(&bytes).is_err());
        assert!(list.deserialize_into(&[1, 0]).is_err());
        assert_eq!(list, before);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.bin");
        let list = sample(4);
        list.save(&path).unwrap();
        assert_eq!(BoxList::load(&path).unwrap(), list);
    }

    #[test]
    fn test_failed_load_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.bin");
        std::fs::write(&path, b"junk").unwrap();
        assert!(BoxList::load(&path).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"junk");
    }
}
