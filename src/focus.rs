//! Through-focus edge widths
//!
//! Images of the same field position and edge orientation taken at several focus
//! positions give one edge width per focus. A parabola fitted to the 20%-80%
//! widths has its vertex at the best focus.

use crate::{fit::polyfit, AnalysisResult, Error, FieldPosition, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use strum_macros::{Display, EnumString};

/// Separates the field position from the edge orientation in a focus folder name
pub const FOCUS_FOLDER_SEPARATOR: &str = "_field_focussing_";

/// Edge orientation
///
/// The centre field has no sagittal or tangential direction, its edges are
/// horizontal and vertical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Sagittal,
    Tangential,
    Horizontal,
    Vertical,
}
impl Orientation {
    /// Orientation of the edges of `field`
    pub fn for_field(self, field: FieldPosition) -> Self {
        match (field, self) {
            (FieldPosition::Centre, Orientation::Sagittal) => Orientation::Horizontal,
            (FieldPosition::Centre, Orientation::Tangential) => Orientation::Vertical,
            (_, orientation) => orientation,
        }
    }
}

/// Field position and edge orientation of a folder named
/// `<field>_field_focussing_<orientation>edge`
pub fn parse_focus_folder(name: &str) -> Option<(FieldPosition, Orientation)> {
    let name = name.to_lowercase();
    let (field, orientation) = name.split_once(FOCUS_FOLDER_SEPARATOR)?;
    let field = FieldPosition::from_folder_name(field).filter(|f| f.to_string() == field)?;
    let orientation: Orientation = orientation
        .strip_suffix("edge")
        .unwrap_or(orientation)
        .parse()
        .ok()?;
    Some((field, orientation.for_field(field)))
}

/// Focus position [micron] leading an image file name, e.g. `+090_2.tif` or `-030.tif`
pub fn parse_focus<P: AsRef<Path>>(path: P) -> Option<f64> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    let end = stem
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map_or(stem.len(), |(i, _)| i);
    stem[..end].parse().ok()
}

/// Edge widths of one image of a through-focus series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusRecord {
    #[serde(rename = "FIELD")]
    pub field: FieldPosition,
    #[serde(rename = "ORIENTATION")]
    pub orientation: Orientation,
    /// [micron]
    #[serde(rename = "FOCUS")]
    pub focus: f64,
    #[serde(rename = "10-90 WIDTH")]
    pub width_10_90: Option<f64>,
    #[serde(rename = "20-80 WIDTH")]
    pub width_20_80: Option<f64>,
    /// AOI center [px]
    #[serde(rename = "XPOS")]
    pub x: f64,
    #[serde(rename = "YPOS")]
    pub y: f64,
}
impl FocusRecord {
    /// Record of the analysis of the image at `focus`
    ///
    /// `center` is used when the result carries no AOI center.
    pub fn new(
        field: FieldPosition,
        orientation: Orientation,
        focus: f64,
        center: [f64; 2],
        result: &AnalysisResult,
    ) -> Self {
        let [x, y] = result.aoi_center.unwrap_or(center);
        Self {
            field,
            orientation,
            focus,
            width_10_90: result.metrics.width_10_90().ok(),
            width_20_80: result.metrics.width_20_80().ok(),
            x,
            y,
        }
    }
}

/// Parabola `c0 + c1*z + c2*z^2` fitted to the 20%-80% edge widths of a
/// through-focus series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusCurve {
    pub field: FieldPosition,
    pub orientation: Orientation,
    /// [micron]
    pub focus: Vec<f64>,
    /// [px]
    pub width: Vec<f64>,
    pub coefficients: [f64; 3],
    /// Mean AOI center [px]
    pub x: f64,
    pub y: f64,
}
impl FocusCurve {
    /// Fits the records with a 20%-80% width, all of `field` and `orientation`
    pub fn fit<'a, I>(field: FieldPosition, orientation: Orientation, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a FocusRecord>,
    {
        let records: Vec<_> = records
            .into_iter()
            .filter_map(|r| r.width_20_80.map(|w| (r, w)))
            .collect();
        let (focus, width): (Vec<f64>, Vec<f64>) =
            records.iter().map(|(r, w)| (r.focus, *w)).unzip();
        let found = focus
            .iter()
            .map(|f| f.to_bits())
            .unique()
            .count();
        if found < 3 {
            return Err(Error::InsufficientFocusRange { found });
        }
        let c = polyfit(&focus, &width, 2).ok_or(Error::InsufficientFocusRange { found })?;
        let n = records.len() as f64;
        let (x, y) = records
            .iter()
            .fold((0., 0.), |(x, y), (r, _)| (x + r.x, y + r.y));
        log::debug!("{field} {orientation}: {:.3e}z^2 {:+.3e}z {:+.3}", c[2], c[1], c[0]);
        Ok(Self {
            field,
            orientation,
            focus,
            width,
            coefficients: [c[0], c[1], c[2]],
            x: x / n,
            y: y / n,
        })
    }
    /// Fitted 20%-80% width at `focus`
    pub fn width_at(&self, focus: f64) -> f64 {
        let [c0, c1, c2] = self.coefficients;
        c0 + focus * (c1 + focus * c2)
    }
    /// Focus of the fit vertex, `None` if the parabola has no minimum
    pub fn best_focus(&self) -> Option<f64> {
        let [_, c1, c2] = self.coefficients;
        (c2 > 0.).then(|| -0.5 * c1 / c2)
    }
    /// Fitted 20%-80% width at the best focus
    pub fn best_width(&self) -> Option<f64> {
        self.best_focus().map(|focus| self.width_at(focus))
    }
}

/// Fits every field position and orientation of a through-focus log
pub fn fit_through_focus(records: &[FocusRecord]) -> Vec<Result<FocusCurve>> {
    records
        .iter()
        .map(|r| ((r.field, r.orientation), r))
        .into_group_map()
        .into_iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|((field, orientation), group)| FocusCurve::fit(field, orientation, group))
        .collect()
}

/// Detector axis a best focus profile runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAxis {
    /// top to bottom, against the AOI row
    UpDown,
    /// left to right, against the AOI column
    LeftRight,
}

/// Best focus along `axis` for the sagittal or tangential edges
///
/// Returns (AOI position, best focus) pairs across the field, skipping the field
/// positions without a fit minimum.
pub fn focus_profile(
    curves: &[FocusCurve],
    axis: FocusAxis,
    orientation: Orientation,
) -> Vec<[f64; 2]> {
    use FieldPosition::*;
    let (fields, centre) = match (axis, orientation) {
        (FocusAxis::UpDown, Orientation::Tangential) => {
            ([Top, TopHalf, Centre, BottomHalf, Bottom], Orientation::Horizontal)
        }
        (FocusAxis::UpDown, _) => (
            [Top, TopHalf, Centre, BottomHalf, Bottom],
            Orientation::Vertical,
        ),
        (FocusAxis::LeftRight, Orientation::Tangential) => (
            [Left, LeftHalf, Centre, RightHalf, Right],
            Orientation::Vertical,
        ),
        (FocusAxis::LeftRight, _) => (
            [Left, LeftHalf, Centre, RightHalf, Right],
            Orientation::Horizontal,
        ),
    };
    fields
        .iter()
        .filter_map(|&field| {
            let wanted = if field == Centre { centre } else { orientation };
            let curve = curves
                .iter()
                .find(|c| c.field == field && c.orientation == wanted)?;
            let position = match axis {
                FocusAxis::UpDown => curve.y,
                FocusAxis::LeftRight => curve.x,
            };
            Some([position, curve.best_focus()?])
        })
        .collect()
}
