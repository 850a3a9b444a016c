//! Little-endian primitives shared by the binary formats.

use std::io::{self, Read, Write};

pub(crate) fn read_bytes<R: Read, const N: usize>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    read_bytes::<_, 4>(r).map(u32::from_le_bytes)
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    read_bytes::<_, 4>(r).map(i32::from_le_bytes)
}

pub(crate) fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    read_bytes::<_, 8>(r).map(f64::from_le_bytes)
}

pub(crate) fn read_i32x3<R: Read>(r: &mut R) -> io::Result<[i32; 3]> {
    Ok([read_i32(r)?, read_i32(r)?, read_i32(r)?])
}

pub(crate) fn read_f64x3<R: Read>(r: &mut R) -> io::Result<[f64; 3]> {
    Ok([read_f64(r)?, read_f64(r)?, read_f64(r)?])
}

/// Read `n` doubles. The caller is responsible for bounding `n`.
pub(crate) fn read_f64_vec<R: Read>(r: &mut R, n: usize) -> io::Result<Vec<f64>> {
    let mut bytes = vec![0u8; n * 8];
    r.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}

pub(crate) fn write_i32s<W: Write>(w: &mut W, values: &[i32]) -> io::Result<()> {
    values
        .iter()
        .try_for_each(|v| w.write_all(&v.to_le_bytes()))
}

pub(crate) fn write_f64s<W: Write>(w: &mut W, values: &[f64]) -> io::Result<()> {
    values
        .iter()
        .try_for_each(|v| w.write_all(&v.to_le_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_roundtrip() {
        let mut buf = Vec::new();
        write_i32s(&mut buf, &[-3, 7, i32::MAX]).unwrap();
        write_f64s(&mut buf, &[1.5, -0.25]).unwrap();
        buf.extend_from_slice(&42u32.to_le_bytes());

        let mut r = buf.as_slice();
        assert_eq!(read_i32x3(&mut r).unwrap(), [-3, 7, i32::MAX]);
        assert_eq!(read_f64_vec(&mut r, 2).unwrap(), vec![1.5, -0.25]);
        assert_eq!(read_u32(&mut r).unwrap(), 42);
        assert_eq!(
            read_f64(&mut r).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
