use crate::{Error, EsfCurve, Result};
use serde::Serialize;

/// Percentile crossings of an ESF transition
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EdgeWidthMetrics {
    /// Low to high transition
    pub rising: bool,
    pub p10: Option<f64>,
    pub p20: Option<f64>,
    pub p50: Option<f64>,
    pub p80: Option<f64>,
    pub p90: Option<f64>,
}
impl EdgeWidthMetrics {
    fn width(lower: Option<f64>, upper: Option<f64>) -> Result<f64> {
        match (lower, upper) {
            (Some(lower), Some(upper)) => Ok((upper - lower).abs()),
            _ => Err(Error::FlatCurveMetric),
        }
    }
    /// 10% to 90% edge width [px]
    pub fn width_10_90(&self) -> Result<f64> {
        Self::width(self.p10, self.p90)
    }
    /// 20% to 80% edge width [px]
    pub fn width_20_80(&self) -> Result<f64> {
        Self::width(self.p20, self.p80)
    }
    /// Largest distance from the edge of the 10% and 90% crossings, 0 if unavailable
    pub fn reach(&self) -> f64 {
        [self.p10, self.p90]
            .into_iter()
            .flatten()
            .map(f64::abs)
            .fold(0., f64::max)
    }
}

/// Finds the 10/20/50/80/90% crossings of the ESF swing
///
/// The curve is walked once from its first sample, at most one new crossing is
/// recorded per sample, and the thresholds are visited in the order the
/// transition direction meets them.
pub fn edge_spec(esf: &EsfCurve) -> Result<EdgeWidthMetrics> {
    if esf.is_empty() {
        return Err(Error::DegenerateResampleGrid);
    }
    let (min, max) = esf.min_max();
    let delta = max - min;
    let rising = esf.values()[0] <= min + 0.5 * delta;
    let fractions: [f64; 5] = if rising {
        [0.1, 0.2, 0.5, 0.8, 0.9]
    } else {
        [0.9, 0.8, 0.5, 0.2, 0.1]
    };
    let mut crossings: [Option<f64>; 5] = [None; 5];
    for (x, v) in esf.iter() {
        if let Some((crossing, _)) = crossings
            .iter_mut()
            .zip(fractions)
            .filter(|(crossing, _)| crossing.is_none())
            .find(|(_, fraction)| {
                let threshold = min + fraction * delta;
                if rising {
                    v > threshold
                } else {
                    v < threshold
                }
            })
        {
            *crossing = Some(x);
        }
    }
    if !rising {
        crossings.reverse();
    }
    let [p10, p20, p50, p80, p90] = crossings;
    let metrics = EdgeWidthMetrics {
        rising,
        p10,
        p20,
        p50,
        p80,
        p90,
    };
    log::debug!("{metrics:?}");
    Ok(metrics)
}
