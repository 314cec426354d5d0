//! Raw ESF outlier rejection and ESF rebuild
//!
//! Raw samples are compared with the resampled ESF value at their nearest grid
//! point. Samples outside the noise band are set aside and the ESF is rebuilt
//! from the remaining ones with a Gaussian kernel, the far tails being
//! optionally replaced by a plain moving average.

use crate::{
    esf::{kernel_average, smooth, EsfPoint},
    image::mean_std,
    metrics::edge_spec,
    Config, Error, EsfCurve, Result,
};

/// Distance to the edge beyond the 10%/90% crossings where the background starts [px]
pub const BACKGROUND_MARGIN: f64 = 3.5;
/// Distance to the edge within which the noise band is widened [px]
pub const TRANSITION_HALF_WIDTH: f64 = 2.5;
/// Noise band widening factor across the transition
pub const TRANSITION_BAND_FACTOR: f64 = 1.75;
/// Half-width of the Gaussian rebuild kernel [px]
pub const GAUSSIAN_SUPPORT: f64 = 2.;

/// Noise rejection outcome
#[derive(Debug, Clone, Default)]
pub struct Filtered {
    /// ESF rebuilt from the accepted samples
    pub esf: EsfCurve,
    pub accepted: Vec<EsfPoint>,
    /// Samples outside the noise band
    pub removed: Vec<EsfPoint>,
    /// Background noise standard deviation
    pub sigma: Option<f64>,
    /// Distance to the edge where the tail averaging starts [px]
    pub tail_start: Option<f64>,
}

/// Background noise standard deviation
///
/// The samples at least `threshold` pixels away from the edge are split by side
/// and the deviations from each side mean are pooled, so the two intensity
/// plateaus do not add up to the noise. The result is floored to 1 count.
pub fn background_sigma(raw: &[EsfPoint], threshold: f64) -> Option<f64> {
    let side = |keep: &dyn Fn(f64) -> bool| -> Vec<f64> {
        raw.iter()
            .filter(|p| keep(p.distance))
            .map(|p| p.intensity)
            .collect()
    };
    let dark = side(&|d| d <= -threshold);
    let bright = side(&|d| d >= threshold);
    let n = dark.len() + bright.len();
    if n == 0 {
        return None;
    }
    let sum_sq: f64 = [dark, bright]
        .iter()
        .filter(|values| !values.is_empty())
        .map(|values| {
            let (_, std) = mean_std(values);
            std * std * values.len() as f64
        })
        .sum();
    Some((sum_sq / n as f64).sqrt().max(1.))
}

/// Splits the raw samples into accepted and removed ones
///
/// A sample is accepted if it is within `band` of the resampled ESF at the
/// nearest grid point, the band being widened by [TRANSITION_BAND_FACTOR] for grid
/// points closer than [TRANSITION_HALF_WIDTH] to the edge.
pub fn split_outliers(
    resampled: &EsfCurve,
    raw: &[EsfPoint],
    band: f64,
) -> (Vec<EsfPoint>, Vec<EsfPoint>) {
    raw.iter().partition(|p| {
        resampled.nearest(p.distance).map_or(true, |j| {
            let (x, v) = (resampled.positions()[j], resampled.values()[j]);
            let tolerance = if x.abs() < TRANSITION_HALF_WIDTH {
                TRANSITION_BAND_FACTOR * band
            } else {
                band
            };
            (v - p.intensity).abs() <= tolerance
        })
    })
}

/// Rebuilds the ESF on the positions of `resampled` from `samples`
///
/// Grid points without any sample within the kernel support are dropped.
pub fn rebuild(
    resampled: &EsfCurve,
    samples: &[EsfPoint],
    tail_start: Option<f64>,
    config: &Config,
) -> Result<EsfCurve> {
    let alpha = config.smoothing_alpha;
    let (positions, values): (Vec<f64>, Vec<f64>) = resampled
        .positions()
        .iter()
        .filter_map(|&x| {
            let value = match tail_start {
                Some(tail_start) if x.abs() >= tail_start => {
                    kernel_average(samples, x, config.tail_smooth_width, |_| 1.)
                }
                _ => kernel_average(samples, x, GAUSSIAN_SUPPORT, |dx| (-alpha * dx * dx).exp()),
            };
            value.map(|v| (x, v))
        })
        .unzip();
    log::debug!(
        "rebuilt ESF: {}/{} grid points",
        positions.len(),
        resampled.len()
    );
    smooth(positions, values, config)
}

/// Removes the noisy raw ESF samples and rebuilds the ESF
///
/// If noise removal is disabled, the resampled ESF is returned unchanged with
/// every raw sample accepted.
pub fn reject_noise(resampled: &EsfCurve, raw: &[EsfPoint], config: &Config) -> Result<Filtered> {
    if !config.remove_noise {
        return Ok(Filtered {
            esf: resampled.clone(),
            accepted: raw.to_vec(),
            ..Default::default()
        });
    }
    let reach = edge_spec(resampled)?.reach();
    let sigma = background_sigma(raw, BACKGROUND_MARGIN + reach).ok_or_else(|| {
        Error::config(format!(
            "no background ESF samples beyond {:.2}px of the edge, increase the normal distance",
            BACKGROUND_MARGIN + reach
        ))
    })?;
    let band = sigma * config.sigma_scaling;
    let (accepted, removed) = split_outliers(resampled, raw, band);
    log::info!(
        "noise band: {band:.1} (sigma: {sigma:.2}), {} samples removed out of {}",
        removed.len(),
        raw.len()
    );
    let tail_start = config
        .tail_smoothing
        .then(|| config.tail_start_factor * reach);
    let esf = rebuild(resampled, &accepted, tail_start, config)?;
    Ok(Filtered {
        esf,
        accepted,
        removed,
        sigma: Some(sigma),
        tail_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esf::resample;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const OUTLIER: f64 = 4.02;

    fn truth(d: f64) -> f64 {
        1000. + 30000. / (1. + (-d / 0.7).exp())
    }

    fn noisy_cloud() -> Vec<EsfPoint> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut raw: Vec<EsfPoint> = (0..=480)
            .map(|i| {
                let d = -12. + i as f64 * 0.05;
                EsfPoint::new(d, truth(d) + rng.gen_range(-50f64..50f64))
            })
            .collect();
        raw.push(EsfPoint::new(OUTLIER, truth(OUTLIER) + 20000.));
        raw
    }

    #[test]
    fn pooled_sigma_ignores_plateaus() {
        let raw: Vec<EsfPoint> = (0..100)
            .map(|i| {
                let d = -10. + i as f64 * 0.2;
                let noise = if i % 2 == 0 { -10. } else { 10. };
                EsfPoint::new(d, if d < 0. { 100. } else { 50000. } + noise)
            })
            .collect();
        let sigma = background_sigma(&raw, 5.).unwrap();
        assert!((sigma - 10.).abs() < 0.1, "sigma: {sigma}");
        assert!(background_sigma(&raw, 20.).is_none());
    }
    #[test]
    fn sigma_floor() {
        let raw = vec![EsfPoint::new(-6., 100.), EsfPoint::new(6., 200.)];
        assert_eq!(background_sigma(&raw, 5.), Some(1.));
    }
    #[test]
    fn outlier_is_removed() {
        let raw = noisy_cloud();
        let config = Config::default();
        let resampled = resample(&raw, &config).unwrap();
        let filtered = reject_noise(&resampled, &raw, &config).unwrap();
        assert!(filtered
            .removed
            .iter()
            .any(|p| p.distance == OUTLIER && p.intensity > truth(OUTLIER) + 10000.));
        assert!(filtered.accepted.iter().all(|p| p.intensity < 40000.));
        assert_eq!(filtered.accepted.len() + filtered.removed.len(), raw.len());
        let sigma = filtered.sigma.unwrap();
        assert!(sigma > 10. && sigma < 60., "sigma: {sigma}");
        let i = filtered.esf.nearest(4.).unwrap();
        let (x, v) = (filtered.esf.positions()[i], filtered.esf.values()[i]);
        assert!((v - truth(x)).abs() < 300., "{x}: {v} vs {}", truth(x));
    }
    #[test]
    fn outlier_is_kept_without_noise_removal() {
        let raw = noisy_cloud();
        let config = Config::default().remove_noise(false);
        let resampled = resample(&raw, &config).unwrap();
        let filtered = reject_noise(&resampled, &raw, &config).unwrap();
        assert!(filtered.removed.is_empty());
        assert_eq!(filtered.accepted.len(), raw.len());
        assert_eq!(filtered.esf, resampled);
        let i = filtered.esf.nearest(4.).unwrap();
        let (x, v) = (filtered.esf.positions()[i], filtered.esf.values()[i]);
        assert!(v - truth(x) > 500., "{x}: {v} vs {}", truth(x));
    }
    #[test]
    fn tail_smoothing() {
        let raw = noisy_cloud();
        let config = Config::default().tail_smoothing(2., 1.);
        let resampled = resample(&raw, &config).unwrap();
        let filtered = reject_noise(&resampled, &raw, &config).unwrap();
        let tail_start = filtered.tail_start.unwrap();
        assert!(tail_start > 2. && tail_start < 5., "tail start: {tail_start}");
        assert_eq!(filtered.esf.len(), resampled.len());
        let (_, last) = filtered.esf.iter().last().unwrap();
        assert!((last - truth(10.)).abs() < 100.);
    }
    #[test]
    fn missing_background() {
        let raw: Vec<EsfPoint> = (0..=40)
            .map(|i| {
                let d = -2. + i as f64 * 0.1;
                EsfPoint::new(d, truth(d))
            })
            .collect();
        let config = Config::default().normal_distance(2.);
        let resampled = resample(&raw, &config).unwrap();
        assert!(matches!(
            reject_noise(&resampled, &raw, &config),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
