use crate::{Error, EsfCurve, LsfCurve, Result};

/// Numerical gradient of `y` sampled at the positions `x`
///
/// Central differences in the interior, one-sided differences at both ends.
pub fn gradient(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = y.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = (i.saturating_sub(1), (i + 1).min(n - 1));
            (y[hi] - y[lo]) / (x[hi] - x[lo])
        })
        .collect()
}

/// Line Spread Function: the derivative of the ESF on the same grid
pub fn differentiate(esf: &EsfCurve) -> Result<LsfCurve> {
    if esf.len() < 2 {
        return Err(Error::DegenerateResampleGrid);
    }
    esf.with_values(gradient(esf.positions(), esf.values()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_gradient() {
        let x: Vec<f64> = (0..11).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|x| x * x).collect();
        let dy = gradient(&x, &y);
        // exact in the interior for a quadratic
        for i in 1..10 {
            assert!((dy[i] - 2. * x[i]).abs() < 1e-12);
        }
        assert!((dy[0] - 0.25).abs() < 1e-12);
        assert!((dy[10] - (6.25 - 5.0625) / 0.25).abs() < 1e-12);
    }
    #[test]
    fn lsf_keeps_the_esf_grid() {
        let esf = EsfCurve::new(vec![-0.5, 0., 0.5, 1.], vec![0., 0., 1., 1.]).unwrap();
        let lsf = differentiate(&esf).unwrap();
        assert_eq!(lsf.positions(), esf.positions());
        assert_eq!(lsf.values(), &[0., 1., 1., 0.]);
    }
    #[test]
    fn single_sample_is_degenerate() {
        let esf = EsfCurve::new(vec![0.], vec![1.]).unwrap();
        assert!(matches!(
            differentiate(&esf),
            Err(Error::DegenerateResampleGrid)
        ));
    }
}
