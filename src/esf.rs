//! Edge Spread Function reconstruction
//!
//! The AOI pixels are projected onto the edge normal, giving a cloud of
//! `(distance, intensity)` samples that is then binned onto a grid oversampling
//! the pixel pitch.

use crate::{savgol::savitzky_golay, Aoi, Config, EdgeLine, Error, EsfCurve, Result};
use serde::Serialize;

/// Half-width of the triangular binning kernel [px]
pub const TRIANGLE_SUPPORT: f64 = 4. / 7.;
/// Polynomial order of the ESF smoothing filter
pub const SMOOTHING_ORDER: usize = 3;

/// Raw ESF sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EsfPoint {
    /// Signed perpendicular distance to the edge [px]
    pub distance: f64,
    pub intensity: f64,
}
impl EsfPoint {
    pub fn new(distance: f64, intensity: f64) -> Self {
        Self {
            distance,
            intensity,
        }
    }
}

/// Projects the AOI pixels onto the edge normal
///
/// A pixel is kept if it is within `normal_distance` of the edge and within
/// `edge_length/2` of the AOI center measured along the edge.
pub fn build_raw_esf(
    aoi: &Aoi,
    line: &EdgeLine,
    normal_distance: f64,
    edge_length: f64,
) -> Vec<EsfPoint> {
    let [ox, oy] = aoi.center();
    let [ux, uy] = line.direction();
    // the edge rotated by 90deg around the AOI center
    let (px, py) = (line.b - ox, -oy);
    let (qx, qy) = (ox - py, oy + px);
    let raw: Vec<EsfPoint> = aoi
        .pixels()
        .filter_map(|([x, y], value)| {
            let (x, y) = (x as f64, y as f64);
            let d = line.signed_distance([x, y]);
            let dc = ((x - qx) * ux + (y - qy) * uy).abs();
            (d.abs() <= normal_distance && dc <= edge_length * 0.5)
                .then(|| EsfPoint::new(d, value as f64))
        })
        .collect();
    log::debug!("{} raw ESF samples", raw.len());
    raw
}

/// Weighted average of the samples within `support` of `x`, `None` if the weights sum to zero
pub(crate) fn kernel_average<F>(raw: &[EsfPoint], x: f64, support: f64, weight: F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let (sum, norm) = raw
        .iter()
        .filter(|p| (p.distance - x).abs() <= support)
        .fold((0f64, 0f64), |(sum, norm), p| {
            let w = weight(p.distance - x);
            (sum + w * p.intensity, norm + w)
        });
    (norm > 0.).then(|| sum / norm)
}

/// Uniform grid `k/oversampling`, `k=-K..=K`, with `K=floor(oversampling*normal_distance)`
pub fn grid(config: &Config) -> Vec<f64> {
    let os = config.oversampling as f64;
    let k_max = (os * config.normal_distance + 1e-9).floor() as i64;
    (-k_max..=k_max).map(|k| k as f64 / os).collect()
}

/// Smooths the values of an ESF with the configured Savitzky-Golay filter
pub(crate) fn smooth(positions: Vec<f64>, values: Vec<f64>, config: &Config) -> Result<EsfCurve> {
    if positions.is_empty() {
        return Err(Error::DegenerateResampleGrid);
    }
    let values = savitzky_golay(&values, config.smoothing_window(), SMOOTHING_ORDER)?;
    EsfCurve::new(positions, values)
}

/// Bins the raw ESF samples onto the oversampled grid with a triangular kernel
/// and smooths the result
///
/// Grid points without samples within the kernel support are dropped.
pub fn resample(raw: &[EsfPoint], config: &Config) -> Result<EsfCurve> {
    let (positions, values): (Vec<f64>, Vec<f64>) = grid(config)
        .into_iter()
        .filter_map(|x| {
            kernel_average(raw, x, TRIANGLE_SUPPORT, |dx| {
                1. - dx.abs() / TRIANGLE_SUPPORT
            })
            .map(|v| (x, v))
        })
        .unzip();
    log::debug!("resampled ESF: {} grid points", positions.len());
    smooth(positions, values, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn logistic_cloud(step: f64, extent: f64) -> Vec<EsfPoint> {
        let n = (2. * extent / step) as usize;
        (0..=n)
            .map(|i| {
                let d = -extent + i as f64 * step;
                EsfPoint::new(d, 1000. + 30000. / (1. + (-d / 0.7).exp()))
            })
            .collect()
    }

    #[test]
    fn grid_is_uniform_and_symmetric() {
        for oversampling in [1, 2, 4, 5, 8, 10] {
            for normal_distance in [2.5, 5., 8.3, 12.] {
                let config = Config::default()
                    .oversampling(oversampling)
                    .normal_distance(normal_distance);
                let positions = grid(&config);
                let step = 1. / oversampling as f64;
                let last = positions[positions.len() - 1];
                assert_eq!(positions.len() % 2, 1);
                assert!((positions[0] + last).abs() < 1e-12);
                assert!(last <= normal_distance + 1e-9);
                assert!(last + step > normal_distance);
                positions
                    .windows(2)
                    .for_each(|w| assert!((w[1] - w[0] - step).abs() < 1e-9));
            }
        }
    }
    #[test]
    fn resampled_positions_are_uniform() {
        let mut rng = StdRng::seed_from_u64(7);
        let raw = logistic_cloud(0.05, 14.);
        for _ in 0..32 {
            let config = Config::default()
                .oversampling(rng.gen_range(3..=12))
                .normal_distance(rng.gen_range(2f64..12f64));
            assert!(config.validate().is_ok());
            let esf = resample(&raw, &config).unwrap();
            let step = config.grid_step();
            assert_eq!(esf.len(), grid(&config).len());
            assert!(esf.positions().windows(2).all(|w| w[1] > w[0]));
            assert!(esf.is_uniform(step, 1e-9), "{config:?}");
        }
    }
    #[test]
    fn resample_is_deterministic() {
        let raw = logistic_cloud(0.037, 11.);
        let config = Config::default();
        assert_eq!(resample(&raw, &config).unwrap(), resample(&raw, &config).unwrap());
    }
    #[test]
    fn unsupported_grid_points_are_dropped() {
        let raw = logistic_cloud(0.05, 3.);
        let config = Config::default().normal_distance(6.);
        let esf = resample(&raw, &config).unwrap();
        assert!(esf.len() < grid(&config).len());
        assert!(esf.positions()[0] > -3.6 && esf.positions()[esf.len() - 1] < 3.6);
        assert!(esf.is_uniform(config.grid_step(), 1e-9));
    }
    #[test]
    fn empty_cloud_is_degenerate() {
        assert!(matches!(
            resample(&[], &Config::default()),
            Err(Error::DegenerateResampleGrid)
        ));
    }
    #[test]
    fn resampled_values_follow_the_cloud() {
        let raw = logistic_cloud(0.05, 12.);
        let esf = resample(&raw, &Config::default()).unwrap();
        for (x, v) in esf.iter() {
            let truth = 1000. + 30000. / (1. + (-x / 0.7).exp());
            assert!((v - truth).abs() < 300., "{x}: {v} vs {truth}");
        }
    }
    #[test]
    fn vertical_edge_projection() {
        let aoi = Aoi::from_fn(21, 21, |x, _| if x < 10 { 100 } else { 200 });
        let line = EdgeLine::new(0., 9.5);
        let raw = build_raw_esf(&aoi, &line, 3., 100.);
        // 6 columns within 3px of the edge, 21 rows each
        assert_eq!(raw.len(), 6 * 21);
        raw.iter().for_each(|p| {
            assert_eq!(p.intensity > 150., p.distance > 0.);
            assert!(p.distance.abs() <= 3.);
        });
        // the rotated edge is the row y=9.5, so |y-9.5| <= 4 keeps rows 6 to 13
        let raw = build_raw_esf(&aoi, &line, 3., 8.);
        assert_eq!(raw.len(), 6 * 8);
    }
}
