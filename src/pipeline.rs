//! Slant-edge analysis sequence
//!
//! [AnalysisContext] holds the validated settings and chains the stages:
//! edge location, AOI re-centering, ESF projection, resampling, noise
//! rejection, edge width, LSF and MTF. Every call works on its own data, so
//! frames can be analysed concurrently with the same context.

use crate::{
    edge::locate_edge,
    esf::{build_raw_esf, resample, EsfPoint},
    lsf::differentiate,
    metrics::{edge_spec, EdgeWidthMetrics},
    mtf::{transform, MtfCurves},
    noise::{reject_noise, Filtered},
    refine::refine_aoi,
    Aoi, Config, Curve, EdgeLine, EsfCurve, Frame, LsfCurve, Result,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Validated analysis settings
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    config: Config,
}

/// Outcome of a slant-edge analysis
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Edge in AOI coordinates, `None` for stacked analyses
    pub line: Option<EdgeLine>,
    /// AOI center in frame coordinates, if the AOI was cropped from a frame
    pub aoi_center: Option<[f64; 2]>,
    /// Number of AOI re-centering moves
    pub aoi_moves: usize,
    /// Number of AOIs contributing to the ESF
    pub aoi_count: usize,
    pub raw: Vec<EsfPoint>,
    /// Triangular kernel resampled ESF
    pub resampled: EsfCurve,
    pub filtered: Filtered,
    pub metrics: EdgeWidthMetrics,
    pub lsf: LsfCurve,
    pub mtf: MtfCurves,
}

/// Edge location and raw ESF of one frame
#[derive(Debug, Clone)]
pub struct EdgeSamples {
    pub line: EdgeLine,
    pub aoi_center: [f64; 2],
    pub aoi_moves: usize,
    pub raw: Vec<EsfPoint>,
}

impl AnalysisContext {
    /// Creates a context from checked settings
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    /// Raw ESF samples of `aoi` around `line`
    pub fn project(&self, aoi: &Aoi, line: &EdgeLine) -> Vec<EsfPoint> {
        build_raw_esf(
            aoi,
            line,
            self.config.normal_distance,
            self.config.edge_length,
        )
    }
    /// Analyses an AOI as is
    pub fn analyse(&self, aoi: &Aoi) -> Result<AnalysisResult> {
        let line = locate_edge(aoi)?;
        log::info!("edge: {line}");
        self.analyse_with_line(aoi, line)
    }
    /// Analyses an AOI with an already located edge
    pub fn analyse_with_line(&self, aoi: &Aoi, line: EdgeLine) -> Result<AnalysisResult> {
        let raw = self.project(aoi, &line);
        Ok(AnalysisResult {
            line: Some(line),
            ..self.analyse_samples(raw)?
        })
    }
    /// Locates the edge in the AOI cropped from `frame` around `center` and
    /// projects the AOI pixels, re-centering the AOI if enabled
    pub fn edge_samples(&self, frame: &Frame, center: [f64; 2]) -> Result<EdgeSamples> {
        let refined = refine_aoi(frame, center, &self.config)?;
        log::info!(
            "edge: {} (AOI center: {:?}, {} move(s))",
            refined.line,
            refined.aoi.frame_center(),
            refined.moves
        );
        Ok(EdgeSamples {
            raw: self.project(&refined.aoi, &refined.line),
            line: refined.line,
            aoi_center: refined.aoi.frame_center(),
            aoi_moves: refined.moves,
        })
    }
    /// Analyses the AOI cropped from `frame` around `center`
    pub fn analyse_frame(&self, frame: &Frame, center: [f64; 2]) -> Result<AnalysisResult> {
        let EdgeSamples {
            line,
            aoi_center,
            aoi_moves,
            raw,
        } = self.edge_samples(frame, center)?;
        Ok(AnalysisResult {
            line: Some(line),
            aoi_center: Some(aoi_center),
            aoi_moves,
            ..self.analyse_samples(raw)?
        })
    }
    /// Analyses the raw ESF samples of one or several AOIs
    pub fn analyse_samples(&self, raw: Vec<EsfPoint>) -> Result<AnalysisResult> {
        let config = &self.config;
        let resampled = resample(&raw, config)?;
        let filtered = reject_noise(&resampled, &raw, config)?;
        let metrics = edge_spec(&filtered.esf)?;
        let width_10_90 = metrics.width_10_90()?;
        log::info!("10%-90% edge width: {width_10_90:.3}px");
        let lsf = differentiate(&filtered.esf)?;
        let mtf = transform(&lsf, width_10_90, config)?;
        Ok(AnalysisResult {
            line: None,
            aoi_center: None,
            aoi_moves: 0,
            aoi_count: 1,
            raw,
            resampled,
            filtered,
            metrics,
            lsf,
            mtf,
        })
    }
    /// Analyses the concatenated raw ESF samples of the AOIs cropped around
    /// `center` in every frame
    ///
    /// The edge is located independently in each frame.
    pub fn analyse_stack(&self, frames: &[Frame], center: [f64; 2]) -> Result<AnalysisResult> {
        let samples = frames
            .par_iter()
            .map(|frame| self.edge_samples(frame, center))
            .collect::<Result<Vec<_>>>()?;
        self.stack(samples)
    }
    /// Analyses the concatenation of several frames raw ESF samples
    pub fn stack<I>(&self, samples: I) -> Result<AnalysisResult>
    where
        I: IntoIterator<Item = EdgeSamples>,
    {
        let mut aoi_count = 0;
        let raw: Vec<EsfPoint> = samples
            .into_iter()
            .inspect(|_| aoi_count += 1)
            .flat_map(|samples| samples.raw)
            .collect();
        log::info!("stacking {} ESF samples from {aoi_count} AOI(s)", raw.len());
        Ok(AnalysisResult {
            aoi_count,
            ..self.analyse_samples(raw)?
        })
    }
}

impl AnalysisResult {
    /// Final ESF
    pub fn esf(&self) -> &EsfCurve {
        &self.filtered.esf
    }
    /// Summary record of the analysis
    pub fn summary(&self, name: impl Into<String>) -> AnalysisSummary {
        let at = |fraction: f64| {
            self.mtf
                .at_nyquist_fraction(fraction)
                .map(|sample| sample.system)
        };
        let reference = self.mtf.reference_value();
        AnalysisSummary {
            name: name.into(),
            angle_deg: self.line.map(|line| line.angle_deg()),
            tilt_deg: self.line.map(|line| line.tilt_deg()),
            aoi_count: self.aoi_count,
            raw_samples: self.raw.len(),
            removed_samples: self.filtered.removed.len(),
            width_10_90: self.metrics.width_10_90().ok(),
            width_20_80: self.metrics.width_20_80().ok(),
            reference_frequency: self.mtf.reference_frequency,
            system_mtf: reference.map(|sample| sample.system),
            optical_mtf: reference.map(|sample| sample.optical),
            mtf_quarter_nyquist: at(0.25),
            mtf_half_nyquist: at(0.5),
            mtf_three_quarter_nyquist: at(0.75),
            mtf_nyquist: at(1.),
        }
    }
}

/// One line analysis summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub name: String,
    pub angle_deg: Option<f64>,
    pub tilt_deg: Option<f64>,
    pub aoi_count: usize,
    pub raw_samples: usize,
    pub removed_samples: usize,
    pub width_10_90: Option<f64>,
    pub width_20_80: Option<f64>,
    /// [cycles/mm]
    pub reference_frequency: f64,
    pub system_mtf: Option<f64>,
    pub optical_mtf: Option<f64>,
    pub mtf_quarter_nyquist: Option<f64>,
    pub mtf_half_nyquist: Option<f64>,
    pub mtf_three_quarter_nyquist: Option<f64>,
    pub mtf_nyquist: Option<f64>,
}
impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{v:.3}"));
        writeln!(f, "{}", self.name)?;
        if let (Some(angle), Some(tilt)) = (self.angle_deg, self.tilt_deg) {
            writeln!(f, " - edge angle: {angle:.2}deg (tilt: {tilt:.2}deg)")?;
        }
        writeln!(
            f,
            " - ESF samples: {} ({} removed) from {} AOI(s)",
            self.raw_samples, self.removed_samples, self.aoi_count
        )?;
        writeln!(
            f,
            " - edge width: 10-90%: {}px, 20-80%: {}px",
            value(self.width_10_90),
            value(self.width_20_80)
        )?;
        writeln!(
            f,
            " - MTF @ {:.2} cycles/mm: system: {}, optical: {}",
            self.reference_frequency,
            value(self.system_mtf),
            value(self.optical_mtf)
        )?;
        write!(
            f,
            " - MTF @ 0.25/0.5/0.75/1.0 Nyquist: {} / {} / {} / {}",
            value(self.mtf_quarter_nyquist),
            value(self.mtf_half_nyquist),
            value(self.mtf_three_quarter_nyquist),
            value(self.mtf_nyquist)
        )
    }
}

/// Bin-wise mean and peak-hold of several system MTFs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AveragedMtf {
    /// [cycles/mm]
    pub frequency: Vec<f64>,
    pub mean: Vec<f64>,
    pub peak: Vec<f64>,
    pub count: usize,
    pub nyquist: f64,
    pub reference_frequency: f64,
}
impl AveragedMtf {
    pub fn mean_curve(&self) -> Result<Curve> {
        Curve::new(self.frequency.clone(), self.mean.clone())
    }
    pub fn peak_curve(&self) -> Result<Curve> {
        Curve::new(self.frequency.clone(), self.peak.clone())
    }
    /// Mean and peak MTFs at the reference frequency
    pub fn reference_value(&self) -> Option<(f64, f64)> {
        Some((
            self.mean_curve().ok()?.interp(self.reference_frequency)?,
            self.peak_curve().ok()?.interp(self.reference_frequency)?,
        ))
    }
}

/// Averages system MTFs on the frequencies of the first one
///
/// The other curves are linearly interpolated when their frequencies differ.
/// Returns `None` if `mtfs` is empty.
pub fn average_mtf<'a, I>(mtfs: I) -> Option<AveragedMtf>
where
    I: IntoIterator<Item = &'a MtfCurves>,
{
    let mut mtfs = mtfs.into_iter();
    let first = mtfs.next()?;
    let frequency = first.frequency.clone();
    let (sum, peak, count) = mtfs.fold(
        (first.system.clone(), first.system.clone(), 1usize),
        |(mut sum, mut peak, count), mtf| {
            let system: Vec<f64> = if mtf.frequency == frequency {
                mtf.system.clone()
            } else {
                match mtf.system_curve() {
                    Ok(curve) => frequency
                        .iter()
                        .map(|&f| curve.interp(f).unwrap_or_default())
                        .collect(),
                    Err(_) => vec![0.; frequency.len()],
                }
            };
            sum.iter_mut()
                .zip(peak.iter_mut())
                .zip(system)
                .for_each(|((s, p), v)| {
                    *s += v;
                    *p = p.max(v);
                });
            (sum, peak, count + 1)
        },
    );
    log::info!("averaged {count} MTF(s)");
    Some(AveragedMtf {
        mean: sum.into_iter().map(|s| s / count as f64).collect(),
        frequency,
        peak,
        count,
        nyquist: first.nyquist,
        reference_frequency: first.reference_frequency,
    })
}

/// Distance of the field AOI centers to the frame border [px]
pub const FIELD_MARGIN: f64 = 50.;

/// Field position of a slant-edge target in the detector frame
///
/// The half-field positions sit halfway between the frame center and the
/// matching border position.
#[derive(EnumIter, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum FieldPosition {
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "top0.5")]
    TopHalf,
    #[serde(rename = "bottom")]
    Bottom,
    #[serde(rename = "bottom0.5")]
    BottomHalf,
    #[serde(rename = "centre")]
    Centre,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "left0.5")]
    LeftHalf,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "right0.5")]
    RightHalf,
}
impl FieldPosition {
    /// Field position of a folder named after it, e.g. `top_0deg` or `left0.5_field`
    pub fn from_folder_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::iter()
            .filter(|position| name.starts_with(&position.to_string()))
            .max_by_key(|position| position.to_string().len())
    }
    /// AOI center in a `width`x`height` frame
    pub fn aoi_center(&self, width: usize, height: usize) -> [f64; 2] {
        let (w, h) = (width as f64, height as f64);
        let (cx, cy) = ((w / 2.).floor(), (h / 2.).floor());
        let halfway = |border: f64, center: f64| ((border + center) / 2.).floor();
        match self {
            FieldPosition::Top => [cx, FIELD_MARGIN],
            FieldPosition::TopHalf => [cx, halfway(FIELD_MARGIN, cy)],
            FieldPosition::Bottom => [cx, h - FIELD_MARGIN],
            FieldPosition::BottomHalf => [cx, halfway(h - FIELD_MARGIN, cy)],
            FieldPosition::Centre => [cx, cy],
            FieldPosition::Left => [FIELD_MARGIN, cy],
            FieldPosition::LeftHalf => [halfway(FIELD_MARGIN, cx), cy],
            FieldPosition::Right => [w - FIELD_MARGIN, cy],
            FieldPosition::RightHalf => [halfway(w - FIELD_MARGIN, cx), cy],
        }
    }
}
impl fmt::Display for FieldPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPosition::Top => write!(f, "top"),
            FieldPosition::TopHalf => write!(f, "top0.5"),
            FieldPosition::Bottom => write!(f, "bottom"),
            FieldPosition::BottomHalf => write!(f, "bottom0.5"),
            FieldPosition::Centre => write!(f, "centre"),
            FieldPosition::Left => write!(f, "left"),
            FieldPosition::LeftHalf => write!(f, "left0.5"),
            FieldPosition::Right => write!(f, "right"),
            FieldPosition::RightHalf => write!(f, "right0.5"),
        }
    }
}
