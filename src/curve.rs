use crate::{Error, Result};
use itertools::Itertools;
use serde::Serialize;

/// Sampled curve `(position, value)` with strictly increasing positions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Curve {
    positions: Vec<f64>,
    values: Vec<f64>,
}
/// Edge Spread Function on the oversampled grid
pub type EsfCurve = Curve;
/// Line Spread Function on the oversampled grid
pub type LsfCurve = Curve;

impl Curve {
    /// Builds a curve from matching positions and values
    pub fn new(positions: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if positions.len() != values.len() {
            return Err(Error::config(format!(
                "curve has {} positions but {} values",
                positions.len(),
                values.len()
            )));
        }
        Ok(Self { positions, values })
    }
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    /// Iterator over `(position, value)`
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.positions.iter().cloned().zip(self.values.iter().cloned())
    }
    /// Returns a curve with the same positions and new values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        Self::new(self.positions.clone(), values)
    }
    /// Smallest and largest values
    pub fn min_max(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            })
    }
    /// `max(position)-min(position)`
    pub fn span(&self) -> f64 {
        match (self.positions.first(), self.positions.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.,
        }
    }
    /// Checks that consecutive positions are `step` apart within `tolerance`
    pub fn is_uniform(&self, step: f64, tolerance: f64) -> bool {
        self.positions
            .iter()
            .tuple_windows()
            .all(|(a, b)| ((b - a) - step).abs() <= tolerance)
    }
    /// Index of the position nearest to `x`
    pub fn nearest(&self, x: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.positions.partition_point(|&p| p < x);
        if i == 0 {
            Some(0)
        } else if i == self.len() {
            Some(self.len() - 1)
        } else if x - self.positions[i - 1] <= self.positions[i] - x {
            Some(i - 1)
        } else {
            Some(i)
        }
    }
    /// Piecewise linear interpolation at `x`, clamped to the end values
    pub fn interp(&self, x: f64) -> Option<f64> {
        let (first, last) = (self.positions.first()?, self.positions.last()?);
        if x <= *first {
            return self.values.first().cloned();
        }
        if x >= *last {
            return self.values.last().cloned();
        }
        self.iter()
            .tuple_windows()
            .find(|((x0, _), (x1, _))| x >= *x0 && x <= *x1)
            .map(|((x0, y0), (x1, y1))| {
                if x1 > x0 {
                    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
                } else {
                    y0
                }
            })
    }
}
