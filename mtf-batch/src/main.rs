//! Batch slant-edge MTF analysis
//!
//! The data directory contains one folder per field position, each folder name
//! starting with a field position: `top`, `bottom`, `centre`, `left`, `right`, or
//! one of the half-field positions `top0.5`, `bottom0.5`, `left0.5`, `right0.5`. Every image in a
//! folder is analysed with the AOI centered on the field position; the MTFs are
//! averaged per folder, and optionally the raw ESFs of all the images of a
//! folder are stacked into a single analysis.
//!
//! With `--through-focus`, the folders are named
//! `<field>_field_focussing_<orientation>edge` and each image file name starts
//! with the focus position in micron, e.g. `+090_1.tif`. The edge widths of all
//! the images are logged and the best focus of each field position and
//! orientation is read at the vertex of a parabola fitted to the 20%-80% widths.

use anyhow::Context;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use slant_edge_mtf::{
    average_mtf, export,
    focus::{
        fit_through_focus, focus_profile, parse_focus, parse_focus_folder, FocusAxis, FocusCurve,
        FocusRecord, Orientation,
    },
    AnalysisContext, AnalysisResult, Config, EdgeSamples, FieldPosition, Frame, NyquistMode,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "mtf-batch", about = "Field position averaged and stacked slant-edge MTFs")]
struct Opt {
    /// Path to the directory with the field position folders
    #[structopt(parse(from_os_str))]
    data_path: PathBuf,
    /// Image file name pattern
    #[structopt(long, default_value = "*.tif")]
    pattern: String,
    /// Stacks the raw ESFs of all the images of a folder
    #[structopt(short, long)]
    stack: bool,
    /// Through-focus analysis of the `<field>_field_focussing_<orientation>edge` folders
    #[structopt(long)]
    through_focus: bool,
    /// Fits the best focus from an existing through-focus log instead of analysing images
    #[structopt(long, parse(from_os_str))]
    focus_log: Option<PathBuf>,
    /// AOI side length [px]
    #[structopt(long, default_value = "64")]
    aoi_size: usize,
    /// ESF samples per pixel
    #[structopt(short, long, default_value = "4")]
    oversampling: usize,
    /// Largest distance to the edge of the ESF samples [px]
    #[structopt(long, default_value = "10")]
    normal_distance: f64,
    /// Keep the noisy ESF samples
    #[structopt(long)]
    keep_noise: bool,
    /// Replace bad pixels differing from their neighbors by more than this factor times the AOI std
    #[structopt(long)]
    bad_pixel_factor: Option<f64>,
    /// Pixel pitch [micron]
    #[structopt(short, long, default_value = "7.7")]
    pitch: f64,
    /// MTF reference frequency: half or full Nyquist
    #[structopt(short, long, default_value = "half")]
    nyquist: NyquistMode,
    /// Directory to write the CSV files to, defaults to the data directory
    #[structopt(long, parse(from_os_str))]
    csv: Option<PathBuf>,
}

fn image_files(folder: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = folder.join(pattern);
    let mut files = glob::glob(pattern.to_str().context("invalid image path")?)?
        .collect::<Result<Vec<_>, _>>()?;
    files.sort();
    Ok(files)
}

fn field_folders(data_path: &Path) -> anyhow::Result<Vec<(FieldPosition, PathBuf)>> {
    let mut folders = vec![];
    for entry in std::fs::read_dir(data_path)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        match FieldPosition::from_folder_name(&name) {
            Some(position) => folders.push((position, path)),
            None => log::warn!("skipping {:?}: not a field position folder", path),
        }
    }
    folders.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(folders)
}

fn focus_folders(data_path: &Path) -> anyhow::Result<Vec<(FieldPosition, Orientation, PathBuf)>> {
    let mut folders = vec![];
    for entry in std::fs::read_dir(data_path)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        match parse_focus_folder(&name) {
            Some((position, orientation)) => folders.push((position, orientation, path)),
            None => log::warn!("skipping {:?}: not a through-focus folder", path),
        }
    }
    folders.sort_by(|a, b| a.2.cmp(&b.2));
    Ok(folders)
}

fn frame_center(path: &Path, position: FieldPosition) -> anyhow::Result<(Frame, [f64; 2])> {
    let frame = Frame::open(path)?;
    let center = position.aoi_center(frame.width(), frame.height());
    Ok((frame, center))
}

fn analyse(
    context: &AnalysisContext,
    path: &Path,
    position: FieldPosition,
) -> anyhow::Result<AnalysisResult> {
    let (frame, center) = frame_center(path, position)?;
    context
        .analyse_frame(&frame, center)
        .with_context(|| format!("analysis of {:?} failed", path))
}

fn edge_samples(
    context: &AnalysisContext,
    path: &Path,
    position: FieldPosition,
) -> anyhow::Result<EdgeSamples> {
    let (frame, center) = frame_center(path, position)?;
    context
        .edge_samples(&frame, center)
        .with_context(|| format!("edge location in {:?} failed", path))
}

fn focus_record(
    context: &AnalysisContext,
    path: &Path,
    position: FieldPosition,
    orientation: Orientation,
    focus: f64,
) -> anyhow::Result<FocusRecord> {
    let (frame, center) = frame_center(path, position)?;
    let result = context
        .analyse_frame(&frame, center)
        .with_context(|| format!("analysis of {:?} failed", path))?;
    Ok(FocusRecord::new(position, orientation, focus, center, &result))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = Config::default()
        .aoi_size(opt.aoi_size)
        .oversampling(opt.oversampling)
        .normal_distance(opt.normal_distance)
        .remove_noise(!opt.keep_noise)
        .pixel_pitch_um(opt.pitch)
        .nyquist(opt.nyquist);
    if let Some(factor) = opt.bad_pixel_factor {
        config = config.bad_pixel_removal(factor);
    }
    let context = AnalysisContext::new(config)?;
    let csv_path = opt.csv.clone().unwrap_or_else(|| opt.data_path.clone());
    std::fs::create_dir_all(&csv_path)?;

    if let Some(log_path) = &opt.focus_log {
        let records = export::read_focus_log(File::open(log_path)?)?;
        return best_focus(&records, &csv_path);
    }
    if opt.through_focus {
        through_focus(&opt, &context, &csv_path)
    } else {
        field_positions(&opt, &context, &csv_path)
    }
}

fn field_positions(opt: &Opt, context: &AnalysisContext, csv_path: &Path) -> anyhow::Result<()> {
    let folders = field_folders(&opt.data_path)?;
    println!("Found {} field position folders", folders.len());

    for (position, folder) in folders {
        let folder_name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| position.to_string());
        let files = image_files(&folder, &opt.pattern)?;
        println!("{folder_name} ({position}): {} images", files.len());
        if files.is_empty() {
            continue;
        }

        let pb = ProgressBar::new(files.len() as u64);
        let results: Vec<(PathBuf, AnalysisResult)> = files
            .par_iter()
            .progress_with(pb)
            .filter_map(|path| match analyse(context, path, position) {
                Ok(result) => Some((path.clone(), result)),
                Err(e) => {
                    log::warn!("skipping {:?}: {:#}", path, e);
                    None
                }
            })
            .collect();
        println!(
            " - {}/{} images analysed",
            results.len(),
            files.len()
        );

        let summaries: Vec<_> = results
            .iter()
            .map(|(path, result)| result.summary(path.to_string_lossy()))
            .collect();
        export::write_summaries(
            File::create(csv_path.join(format!("{folder_name}_summary.csv")))?,
            &summaries,
        )?;

        if let Some(average) = average_mtf(results.iter().map(|(_, result)| &result.mtf)) {
            if let Some((mean, peak)) = average.reference_value() {
                println!(
                    " - MTF @ {:.2} cycles/mm: mean: {:.3}, peak: {:.3}",
                    average.reference_frequency, mean, peak
                );
            }
            export::write_averaged_mtf(
                File::create(csv_path.join(format!("averaged_{folder_name}.csv")))?,
                &average,
            )?;
        } else {
            log::warn!("no MTF to average in {:?}", folder);
        }

        if opt.stack {
            let pb = ProgressBar::new(files.len() as u64);
            let samples: Vec<EdgeSamples> = files
                .par_iter()
                .progress_with(pb)
                .filter_map(|path| match edge_samples(context, path, position) {
                    Ok(samples) => Some(samples),
                    Err(e) => {
                        log::warn!("skipping {:?}: {:#}", path, e);
                        None
                    }
                })
                .collect();
            match context.stack(samples) {
                Ok(stacked) => {
                    let stem = format!("stacked_{folder_name}");
                    println!("{}", stacked.summary(stem.as_str()));
                    export::export_analysis(csv_path, &stem, &stacked)?;
                }
                Err(e) => log::warn!("stacked analysis of {:?} failed: {}", folder, e),
            }
        }
    }

    Ok(())
}

fn through_focus(opt: &Opt, context: &AnalysisContext, csv_path: &Path) -> anyhow::Result<()> {
    let folders = focus_folders(&opt.data_path)?;
    println!("Found {} through-focus folders", folders.len());

    let mut records: Vec<FocusRecord> = vec![];
    for (position, orientation, folder) in folders {
        let files: Vec<(f64, PathBuf)> = image_files(&folder, &opt.pattern)?
            .into_iter()
            .filter_map(|path| match parse_focus(&path) {
                Some(focus) => Some((focus, path)),
                None => {
                    log::warn!("skipping {:?}: no focus position in the file name", path);
                    None
                }
            })
            .collect();
        println!("{position} {orientation}: {} images", files.len());

        let pb = ProgressBar::new(files.len() as u64);
        let mut folder_records: Vec<FocusRecord> = files
            .par_iter()
            .progress_with(pb)
            .filter_map(
                |(focus, path)| match focus_record(context, path, position, orientation, *focus) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        log::warn!("skipping {:?}: {:#}", path, e);
                        None
                    }
                },
            )
            .collect();
        folder_records.sort_by(|a, b| b.focus.total_cmp(&a.focus));
        records.append(&mut folder_records);
    }

    let log_path = csv_path.join("through_focus_log.csv");
    log::info!("Writing {:?}...", log_path);
    export::write_focus_log(File::create(log_path)?, &records)?;
    best_focus(&records, csv_path)
}

fn best_focus(records: &[FocusRecord], csv_path: &Path) -> anyhow::Result<()> {
    let curves: Vec<FocusCurve> = fit_through_focus(records)
        .into_iter()
        .filter_map(|curve| {
            curve
                .map_err(|e| log::warn!("through-focus fit failed: {}", e))
                .ok()
        })
        .collect();
    for curve in &curves {
        match (curve.best_focus(), curve.best_width()) {
            (Some(focus), Some(width)) => println!(
                "{} {}: best focus {:+.1} micron, 20-80 width: {:.3} px",
                curve.field, curve.orientation, focus, width
            ),
            _ => println!(
                "{} {}: no best focus within the fit",
                curve.field, curve.orientation
            ),
        }
    }
    for axis in [FocusAxis::UpDown, FocusAxis::LeftRight] {
        for orientation in [Orientation::Sagittal, Orientation::Tangential] {
            let profile = focus_profile(&curves, axis, orientation);
            if !profile.is_empty() {
                println!("{axis:?} {orientation} best focus: {:.1?}", profile);
            }
        }
    }
    export::write_focus_curves(File::create(csv_path.join("best_focus.csv"))?, &curves)?;
    Ok(())
}
