//! Sub-pixel straight edge location
//!
//! Each AOI row crossed by the edge is fitted with a logistic profile, the
//! fitted centers are then regressed against the row index.

use crate::{
    fit::{fit_line, fit_logistic, LmOptions, Logistic},
    Aoi, Error, Result,
};
use serde::Serialize;
use std::fmt;

/// Straight edge `x = m*y + b` in AOI pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeLine {
    /// columns per row
    pub m: f64,
    /// column at row 0
    pub b: f64,
}
impl EdgeLine {
    pub fn new(m: f64, b: f64) -> Self {
        Self { m, b }
    }
    /// Column of the edge at row `y`
    pub fn x_at(&self, y: f64) -> f64 {
        self.m * y + self.b
    }
    /// Unit vector along the edge
    pub fn direction(&self) -> [f64; 2] {
        let n = self.m.hypot(1.);
        [self.m / n, 1. / n]
    }
    /// Unit normal pointing toward increasing columns
    pub fn normal(&self) -> [f64; 2] {
        let n = self.m.hypot(1.);
        [1. / n, -self.m / n]
    }
    /// Signed perpendicular distance of `p` (x,y), positive on the right of the edge
    pub fn signed_distance(&self, p: [f64; 2]) -> f64 {
        let [nx, ny] = self.normal();
        (p[0] - self.b) * nx + p[1] * ny
    }
    /// Angle between the edge and the image x-axis in degrees, within (-90,90]
    pub fn angle_deg(&self) -> f64 {
        let theta = 1f64.atan2(self.m).to_degrees();
        if theta > 90. {
            theta - 180.
        } else {
            theta
        }
    }
    /// Unsigned tilt of the edge from the image y-axis in degrees
    pub fn tilt_deg(&self) -> f64 {
        self.m.atan().to_degrees().abs()
    }
    /// Same edge seen from an AOI whose origin moved by `shift` (x,y)
    pub fn shifted(&self, shift: [f64; 2]) -> Self {
        Self {
            m: self.m,
            b: self.b - shift[0] + self.m * shift[1],
        }
    }
}
impl fmt::Display for EdgeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x = {:.4}*y + {:.3} (angle: {:.2}deg, tilt: {:.2}deg)",
            self.m,
            self.b,
            self.angle_deg(),
            self.tilt_deg()
        )
    }
}

/// Locates the edge crossing the rows of `aoi`
///
/// A row is fitted if its standard deviation is at least half the AOI one. When
/// both the first and the last rows pass that test, the edge crosses the whole
/// AOI and every non-constant row is fitted.
pub fn locate_edge(aoi: &Aoi) -> Result<EdgeLine> {
    let threshold = aoi.std() * 0.5;
    let last = aoi.height().saturating_sub(1);
    let filter_rows =
        aoi.height() == 0 || aoi.row_std(0) < threshold || aoi.row_std(last) < threshold;

    let mut rows = vec![];
    let mut centers = vec![];
    for y in 0..aoi.height() {
        let row_std = aoi.row_std(y);
        if row_std == 0. || (filter_rows && row_std < threshold) {
            continue;
        }
        let profile = aoi.row(y);
        let fit = fit_logistic(&profile, Logistic::guess(&profile), LmOptions::default())
            .ok_or(Error::CurveFitDivergence { row: y })?;
        log::trace!("row #{y}: {fit:?}");
        rows.push(y as f64);
        centers.push(fit.c);
    }
    log::debug!("{} edge observations", rows.len());
    if rows.is_empty() {
        return Err(Error::InsufficientEdgeSignal);
    }
    let (m, b) = fit_line(&rows, &centers).ok_or(Error::InsufficientEdgeSignal)?;
    let line = EdgeLine::new(m, b);
    log::debug!("edge: {line}");
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry() {
        let vertical = EdgeLine::new(0., 5.);
        assert!((vertical.angle_deg() - 90.).abs() < 1e-12);
        assert_eq!(vertical.tilt_deg(), 0.);
        assert_eq!(vertical.signed_distance([7., 3.]), 2.);
        assert_eq!(vertical.signed_distance([4., -3.]), -1.);

        let slanted = EdgeLine::new(0.1, 0.);
        assert!((slanted.tilt_deg() - 0.1f64.atan().to_degrees()).abs() < 1e-12);
        assert!((slanted.angle_deg() - 10f64.atan().to_degrees()).abs() < 1e-12);
        let falling = EdgeLine::new(-0.1, 0.);
        assert!((falling.angle_deg() + 10f64.atan().to_degrees()).abs() < 1e-12);
        assert!((falling.tilt_deg() - slanted.tilt_deg()).abs() < 1e-12);
    }
    #[test]
    fn distance_along_normal() {
        let line = EdgeLine::new(0.2, 3.);
        let [nx, ny] = line.normal();
        let on_line = [line.x_at(4.), 4.];
        let p = [on_line[0] + 2.5 * nx, on_line[1] + 2.5 * ny];
        assert!((line.signed_distance(p) - 2.5).abs() < 1e-12);
        let [ux, uy] = line.direction();
        assert!((ux * nx + uy * ny).abs() < 1e-12);
    }
    #[test]
    fn shifted_origin() {
        let line = EdgeLine::new(0.25, 10.);
        let moved = line.shifted([3., 4.]);
        // the frame point (10+0.25*8, 8) is (x-3, y-4) in the moved AOI
        assert!((moved.x_at(4.) - (line.x_at(8.) - 3.)).abs() < 1e-12);
    }
    #[test]
    fn vertical_step() {
        let aoi = Aoi::from_fn(32, 32, |x, _| if x < 16 { 0 } else { 65535 });
        let line = locate_edge(&aoi).unwrap();
        assert!(line.m.abs() < 1e-9, "{line}");
        assert!(line.b > 15. && line.b < 16., "{line}");
    }
    #[test]
    fn low_variance_rows_are_skipped_below_a_flat_border() {
        // the edge stops at row 20, the rows below only carry a faint ripple
        let aoi = Aoi::from_fn(32, 32, |x, y| match (x < 16, y < 20) {
            (true, true) => 0,
            (false, true) => 65535,
            _ => 30000 + 100 * (x % 2) as u16,
        });
        let line = locate_edge(&aoi).unwrap();
        assert!(line.m.abs() < 1e-9, "{line}");
        assert!(line.b > 15. && line.b < 16., "{line}");
    }
    #[test]
    fn flat_aoi_has_no_edge() {
        let aoi = Aoi::from_fn(24, 24, |_, _| 1000);
        assert!(matches!(
            locate_edge(&aoi),
            Err(Error::InsufficientEdgeSignal)
        ));
    }
    #[test]
    fn horizontal_edge_is_not_crossing_rows() {
        let aoi = Aoi::from_fn(24, 24, |_, y| if y < 12 { 0 } else { 40000 });
        assert!(matches!(
            locate_edge(&aoi),
            Err(Error::InsufficientEdgeSignal)
        ));
    }
}
