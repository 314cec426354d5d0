//! CSV output of the analysis curves and summaries

use crate::{
    focus::{FocusCurve, FocusRecord, Orientation},
    pipeline::{AnalysisResult, AnalysisSummary, AveragedMtf},
    Curve, FieldPosition, MtfCurves, Result,
};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Serialize)]
struct RawRecord {
    #[serde(rename = "distance [px]")]
    distance: f64,
    intensity: f64,
    accepted: bool,
}

#[derive(Serialize)]
struct CurveRecord {
    #[serde(rename = "position [px]")]
    position: f64,
    value: f64,
}

#[derive(Serialize)]
struct MtfRecord {
    #[serde(rename = "frequency [cycles/mm]")]
    frequency: f64,
    system: f64,
    detector: f64,
    optical: f64,
}

#[derive(Serialize)]
struct AveragedMtfRecord {
    #[serde(rename = "frequency [cycles/mm]")]
    frequency: f64,
    mean: f64,
    peak: f64,
}

#[derive(Serialize)]
struct FocusCurveRecord {
    #[serde(rename = "FIELD")]
    field: FieldPosition,
    #[serde(rename = "ORIENTATION")]
    orientation: Orientation,
    #[serde(rename = "XPOS")]
    x: f64,
    #[serde(rename = "YPOS")]
    y: f64,
    #[serde(rename = "C0")]
    c0: f64,
    #[serde(rename = "C1")]
    c1: f64,
    #[serde(rename = "C2")]
    c2: f64,
    #[serde(rename = "BEST FOCUS")]
    best_focus: Option<f64>,
    #[serde(rename = "BEST 20-80 WIDTH")]
    best_width: Option<f64>,
    #[serde(rename = "SAMPLES")]
    samples: usize,
}

fn write_records<W, R, I>(writer: W, records: I) -> Result<()>
where
    W: io::Write,
    R: Serialize,
    I: IntoIterator<Item = R>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    records
        .into_iter()
        .map(|record| wtr.serialize(record))
        .collect::<std::result::Result<Vec<()>, csv::Error>>()?;
    wtr.flush()?;
    Ok(())
}

/// Writes the accepted and removed raw ESF samples
pub fn write_raw_esf<W: io::Write>(writer: W, result: &AnalysisResult) -> Result<()> {
    let tagged = |accepted: bool| {
        move |p: &crate::esf::EsfPoint| RawRecord {
            distance: p.distance,
            intensity: p.intensity,
            accepted,
        }
    };
    write_records(
        writer,
        result
            .filtered
            .accepted
            .iter()
            .map(tagged(true))
            .chain(result.filtered.removed.iter().map(tagged(false))),
    )
}

/// Writes an ESF or LSF curve
pub fn write_curve<W: io::Write>(writer: W, curve: &Curve) -> Result<()> {
    write_records(
        writer,
        curve
            .iter()
            .map(|(position, value)| CurveRecord { position, value }),
    )
}

pub fn write_mtf<W: io::Write>(writer: W, mtf: &MtfCurves) -> Result<()> {
    write_records(
        writer,
        mtf.frequency
            .iter()
            .zip(&mtf.system)
            .zip(mtf.detector.iter().zip(&mtf.optical))
            .map(|((&frequency, &system), (&detector, &optical))| MtfRecord {
                frequency,
                system,
                detector,
                optical,
            }),
    )
}

pub fn write_averaged_mtf<W: io::Write>(writer: W, mtf: &AveragedMtf) -> Result<()> {
    write_records(
        writer,
        mtf.frequency
            .iter()
            .zip(mtf.mean.iter().zip(&mtf.peak))
            .map(|(&frequency, (&mean, &peak))| AveragedMtfRecord {
                frequency,
                mean,
                peak,
            }),
    )
}

/// Writes one summary per line
pub fn write_summaries<'a, W, I>(writer: W, summaries: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = &'a AnalysisSummary>,
{
    write_records(writer, summaries)
}

/// Writes a through-focus log, one image per line
pub fn write_focus_log<'a, W, I>(writer: W, records: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = &'a FocusRecord>,
{
    write_records(writer, records)
}

/// Reads back a through-focus log
pub fn read_focus_log<R: io::Read>(reader: R) -> Result<Vec<FocusRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    Ok(rdr
        .deserialize()
        .collect::<std::result::Result<Vec<FocusRecord>, csv::Error>>()?)
}

/// Writes the parabola and the best focus of each through-focus series
pub fn write_focus_curves<'a, W, I>(writer: W, curves: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = &'a FocusCurve>,
{
    write_records(
        writer,
        curves.into_iter().map(|curve| {
            let [c0, c1, c2] = curve.coefficients;
            FocusCurveRecord {
                field: curve.field,
                orientation: curve.orientation,
                x: curve.x,
                y: curve.y,
                c0,
                c1,
                c2,
                best_focus: curve.best_focus(),
                best_width: curve.best_width(),
                samples: curve.focus.len(),
            }
        }),
    )
}

/// Writes `<stem>_raw-esf.csv`, `<stem>_esf.csv`, `<stem>_lsf.csv` and
/// `<stem>_mtf.csv` into `dir`
pub fn export_analysis<P: AsRef<Path>>(
    dir: P,
    stem: &str,
    result: &AnalysisResult,
) -> Result<Vec<PathBuf>> {
    let path = |suffix: &str| dir.as_ref().join(format!("{stem}_{suffix}.csv"));
    let paths = vec![
        path("raw-esf"),
        path("esf"),
        path("lsf"),
        path("mtf"),
    ];
    log::info!("Writing {:?}...", paths);
    write_raw_esf(std::fs::File::create(&paths[0])?, result)?;
    write_curve(std::fs::File::create(&paths[1])?, result.esf())?;
    write_curve(std::fs::File::create(&paths[2])?, &result.lsf)?;
    write_mtf(std::fs::File::create(&paths[3])?, &result.mtf)?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_csv() {
        let curve = Curve::new(vec![-0.25, 0.], vec![1., 2.5]).unwrap();
        let mut buffer = vec![];
        write_curve(&mut buffer, &curve).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        assert_eq!(csv, "position [px],value\n-0.25,1.0\n0.0,2.5\n");
    }
    #[test]
    fn mtf_csv() {
        let mtf = MtfCurves {
            frequency: vec![0., 10.],
            system: vec![1., 0.5],
            detector: vec![1., 0.9],
            optical: vec![1., 0.5 / 0.9],
            nyquist: 50.,
            reference_frequency: 25.,
        };
        let mut buffer = vec![];
        write_mtf(&mut buffer, &mtf).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("frequency [cycles/mm],system,detector,optical")
        );
        assert_eq!(lines.next(), Some("0.0,1.0,1.0,1.0"));
        assert_eq!(csv.lines().count(), 3);
    }
    #[test]
    fn summary_csv() {
        let summary = AnalysisSummary {
            name: "centre".to_string(),
            angle_deg: Some(85.),
            tilt_deg: Some(5.),
            aoi_count: 1,
            raw_samples: 100,
            removed_samples: 2,
            width_10_90: Some(1.5),
            width_20_80: None,
            reference_frequency: 32.5,
            system_mtf: Some(0.6),
            optical_mtf: Some(0.7),
            mtf_quarter_nyquist: Some(0.8),
            mtf_half_nyquist: Some(0.6),
            mtf_three_quarter_nyquist: Some(0.4),
            mtf_nyquist: Some(0.2),
        };
        let mut buffer = vec![];
        write_summaries(&mut buffer, [&summary]).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("name,angle_deg,tilt_deg"));
        assert_eq!(
            lines.next(),
            Some("centre,85.0,5.0,1,100,2,1.5,,32.5,0.6,0.7,0.8,0.6,0.4,0.2")
        );
    }
    #[test]
    fn focus_log_csv() {
        let text = "FIELD,ORIENTATION,FOCUS,10-90 WIDTH,20-80 WIDTH,XPOS,YPOS\n\
                   top0.5,sagittal,+090,2.1,1.3,640,281\n\
                   centre,vertical,-030,,,640,512\n";
        let records = read_focus_log(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field, FieldPosition::TopHalf);
        assert_eq!(records[0].orientation, Orientation::Sagittal);
        assert_eq!(records[0].focus, 90.);
        assert_eq!(records[0].width_20_80, Some(1.3));
        assert_eq!(records[1].width_10_90, None);
        assert_eq!((records[1].x, records[1].y), (640., 512.));

        let mut buffer = vec![];
        write_focus_log(&mut buffer, &records).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("FIELD,ORIENTATION,FOCUS,10-90 WIDTH,20-80 WIDTH,XPOS,YPOS")
        );
        assert_eq!(lines.next(), Some("top0.5,sagittal,90.0,2.1,1.3,640.0,281.0"));
        assert_eq!(lines.next(), Some("centre,vertical,-30.0,,,640.0,512.0"));
    }
    #[test]
    fn focus_curve_csv() {
        let curve = FocusCurve {
            field: FieldPosition::Left,
            orientation: Orientation::Tangential,
            focus: vec![-30., 0., 30.],
            width: vec![2., 1., 2.],
            coefficients: [1., -1., 0.5],
            x: 50.,
            y: 512.,
        };
        let mut buffer = vec![];
        write_focus_curves(&mut buffer, [&curve]).unwrap();
        let csv = String::from_utf8(buffer).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("FIELD,ORIENTATION,XPOS,YPOS,C0,C1,C2,BEST FOCUS,BEST 20-80 WIDTH,SAMPLES")
        );
        assert_eq!(lines.next(), Some("left,tangential,50.0,512.0,1.0,-1.0,0.5,1.0,0.5,3"));
    }
}
