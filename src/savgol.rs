//! Savitzky-Golay smoothing

use crate::{Error, Result};
use nalgebra::DMatrix;

/// Savitzky-Golay smoothing coefficients of a centered `window` for a polynomial of degree `order`
pub fn coefficients(window: usize, order: usize) -> Result<Vec<f64>> {
    if window % 2 != 1 {
        return Err(Error::config(format!(
            "Savitzky-Golay window must be a positive odd number, found {window}"
        )));
    }
    if window < order + 2 {
        return Err(Error::config(format!(
            "Savitzky-Golay window {window} is too small for a polynomial of order {order}"
        )));
    }
    let half = (window / 2) as f64;
    let vandermonde = DMatrix::from_fn(window, order + 1, |i, j| (i as f64 - half).powi(j as i32));
    let pinv = vandermonde
        .pseudo_inverse(1e-12)
        .map_err(Error::config)?;
    Ok(pinv.row(0).iter().cloned().collect())
}

/// Smooths `y` with a Savitzky-Golay filter
///
/// The signal is padded with its first samples mirrored about `y[0]` and folded
/// below it, `y[0] - |y[i] - y[0]|`, and with its last samples mirrored about
/// `y[n-1]` and folded above it, `y[n-1] + |y[n-1-i] - y[n-1]|`.
pub fn savitzky_golay(y: &[f64], window: usize, order: usize) -> Result<Vec<f64>> {
    let coefs = coefficients(window, order)?;
    let half = window / 2;
    let n = y.len();
    if n <= half {
        return Err(Error::DegenerateResampleGrid);
    }
    let (first, last) = (y[0], y[n - 1]);
    let padded: Vec<f64> = (1..=half)
        .rev()
        .map(|i| first - (y[i] - first).abs())
        .chain(y.iter().cloned())
        .chain((n - 1 - half..n - 1).rev().map(|i| last + (y[i] - last).abs()))
        .collect();
    Ok(padded
        .windows(window)
        .map(|w| w.iter().zip(&coefs).map(|(v, c)| v * c).sum())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn five_point_cubic_coefficients() {
        let coefs = coefficients(5, 3).unwrap();
        let expected = [-3., 12., 17., 12., -3.].map(|c| c / 35.);
        coefs
            .iter()
            .zip(expected)
            .for_each(|(c, e)| assert_abs_diff_eq!(*c, e, epsilon = 1e-12));
    }
    #[test]
    fn invalid_windows() {
        assert!(matches!(
            coefficients(4, 3),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            coefficients(3, 3),
            Err(Error::InvalidConfiguration(_))
        ));
    }
    #[test]
    fn cubic_is_preserved_in_the_interior() {
        let y: Vec<f64> = (0..20)
            .map(|i| {
                let x = i as f64 * 0.3;
                0.5 * x * x * x - 2. * x * x + x - 4.
            })
            .collect();
        let smooth = savitzky_golay(&y, 7, 3).unwrap();
        assert_eq!(smooth.len(), y.len());
        for i in 3..17 {
            assert!((smooth[i] - y[i]).abs() < 1e-9);
        }
    }
    #[test]
    fn constant_is_preserved() {
        let y = vec![42.; 9];
        let smooth = savitzky_golay(&y, 5, 3).unwrap();
        smooth.iter().for_each(|v| assert!((v - 42.).abs() < 1e-9));
    }
    #[test]
    fn ends_are_folded_reflections() {
        // 3-point moving average over [2 | 3, 2, 1, 0 | 1]
        let smooth = savitzky_golay(&[3., 2., 1., 0.], 3, 1).unwrap();
        let expected = [7. / 3., 2., 1., 2. / 3.];
        smooth
            .iter()
            .zip(expected)
            .for_each(|(s, e)| assert_abs_diff_eq!(*s, e, epsilon = 1e-12));
    }
    #[test]
    fn too_short_signal() {
        assert!(matches!(
            savitzky_golay(&[1., 2.], 5, 3),
            Err(Error::DegenerateResampleGrid)
        ));
    }
}
