use slant_edge_mtf::{export, AnalysisContext, Config, Frame, NyquistMode};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "slant-edge", about = "Slant-edge MTF of a detector image")]
struct Opt {
    /// Path to the 8 or 16 bit grayscale image
    #[structopt(parse(from_os_str))]
    image: PathBuf,
    /// AOI center column
    #[structopt(short, long)]
    x: f64,
    /// AOI center row
    #[structopt(short, long)]
    y: f64,
    /// AOI side length [px]
    #[structopt(long, default_value = "64")]
    aoi_size: usize,
    /// Keep the AOI where it is
    #[structopt(long)]
    static_aoi: bool,
    /// Number of AOI re-centering iterations
    #[structopt(long, default_value = "2")]
    refine_iterations: usize,
    /// AOI re-centering edge distance threshold [px]
    #[structopt(long, default_value = "2")]
    refine_tolerance: f64,
    /// Replace bad pixels differing from their neighbors by more than this factor times the AOI std
    #[structopt(long)]
    bad_pixel_factor: Option<f64>,
    /// ESF samples per pixel
    #[structopt(short, long, default_value = "4")]
    oversampling: usize,
    /// Largest distance to the edge of the ESF samples [px]
    #[structopt(long, default_value = "10")]
    normal_distance: f64,
    /// Length of the edge used for the ESF [px]
    #[structopt(long, default_value = "40")]
    edge_length: f64,
    /// Keep the noisy ESF samples
    #[structopt(long)]
    keep_noise: bool,
    /// Noise band scaling factor
    #[structopt(long, default_value = "3")]
    sigma_scaling: f64,
    /// ESF tail start in units of the 10%/90% crossings distance to the edge
    #[structopt(long)]
    tail_start: Option<f64>,
    /// ESF tail averaging half-width [px]
    #[structopt(long, default_value = "1")]
    tail_width: f64,
    /// ESF rebuild Gaussian kernel exponent
    #[structopt(long, default_value = "5")]
    alpha: f64,
    /// Pixel pitch [micron]
    #[structopt(short, long, default_value = "7.7")]
    pitch: f64,
    /// MTF reference frequency: half or full Nyquist
    #[structopt(short, long, default_value = "half")]
    nyquist: NyquistMode,
    /// Directory to write the ESF, LSF and MTF CSV files to
    #[structopt(long, parse(from_os_str))]
    csv: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = Config::default()
        .aoi_size(opt.aoi_size)
        .dynamic_aoi(!opt.static_aoi)
        .refine(opt.refine_iterations, opt.refine_tolerance)
        .oversampling(opt.oversampling)
        .normal_distance(opt.normal_distance)
        .edge_length(opt.edge_length)
        .remove_noise(!opt.keep_noise)
        .sigma_scaling(opt.sigma_scaling)
        .smoothing_alpha(opt.alpha)
        .pixel_pitch_um(opt.pitch)
        .nyquist(opt.nyquist);
    if let Some(factor) = opt.bad_pixel_factor {
        config = config.bad_pixel_removal(factor);
    }
    if let Some(start) = opt.tail_start {
        config = config.tail_smoothing(start, opt.tail_width);
    }
    let context = AnalysisContext::new(config)?;

    let frame = Frame::open(&opt.image)?;
    println!(
        "{:?}: {}x{} pixels",
        opt.image,
        frame.width(),
        frame.height()
    );
    let result = context.analyse_frame(&frame, [opt.x, opt.y])?;
    let name = opt
        .image
        .file_stem()
        .map_or("image".to_string(), |stem| stem.to_string_lossy().to_string());
    println!("{}", result.summary(name.as_str()));

    if let Some(dir) = opt.csv {
        std::fs::create_dir_all(&dir)?;
        let paths = export::export_analysis(&dir, &name, &result)?;
        println!("CSV files: {:?}", paths);
    }
    Ok(())
}
