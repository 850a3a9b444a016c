//! One-dimensional interpolation kernels.
//!
//! The tricubic sampler is the tensor product of the Catmull-Rom kernel
//! below. It interpolates the nodes exactly and is C1 across cell faces,
//! which keeps box gradients continuous as faces sweep through cells.

/// Catmull-Rom weights for the four nodes `i-1, i, i+1, i+2` at local
/// coordinate `t` in `[0, 1]`, together with their derivatives in `t`.
#[inline]
pub(crate) fn catmull_rom(t: f64) -> ([f64; 4], [f64; 4]) {
    let t2 = t * t;
    let t3 = t2 * t;
    let w = [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ];
    let dw = [
        0.5 * (-3.0 * t2 + 4.0 * t - 1.0),
        0.5 * (9.0 * t2 - 10.0 * t),
        0.5 * (-9.0 * t2 + 8.0 * t + 1.0),
        0.5 * (3.0 * t2 - 2.0 * t),
    ];
    (w, dw)
}

/// Linear weights for nodes `i, i+1`.
#[inline]
pub(crate) fn linear(t: f64) -> [f64; 2] {
    [1.0 - t, t]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_of_unity() {
        for k in 0..=10 {
            let t = k as f64 / 10.0;
            let (w, dw) = catmull_rom(t);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(dw.iter().sum::<f64>().abs() < 1e-12);
        }
    }

    #[test]
    fn test_interpolates_nodes() {
        let (w0, _) = catmull_rom(0.0);
        assert_eq!(w0, [0.0, 1.0, 0.0, 0.0]);
        let (w1, _) = catmull_rom(1.0);
        assert!((w1[2] - 1.0).abs() < 1e-12);
        assert!(w1[0].abs() < 1e-12 && w1[1].abs() < 1e-12 && w1[3].abs() < 1e-12);
    }

    #[test]
    fn test_reproduces_linear_data() {
        // Node values 0, 1, 2, 3 at positions -1, 0, 1, 2.
        for k in 0..=8 {
            let t = k as f64 / 8.0;
            let (w, dw) = catmull_rom(t);
            let v: f64 = (0..4).map(|i| w[i] * (i as f64 - 1.0)).sum();
            let d: f64 = (0..4).map(|i| dw[i] * (i as f64 - 1.0)).sum();
            assert!((v - t).abs() < 1e-12);
            assert!((d - 1.0).abs() < 1e-12);
        }
    }
}
