//! # Slant-edge MTF
//!
//! Measures the Modulation Transfer Function of an imaging detector from the
//! image of a slanted straight edge.
//!
//! The edge is located with sub-pixel accuracy inside an Area-Of-Interest (AOI),
//! the AOI pixels are projected onto the edge normal to build an oversampled
//! Edge Spread Function (ESF), noisy samples are rejected, and the derivative of
//! the ESF, the Line Spread Function (LSF), is Fourier transformed into the
//! system and optical MTFs.
//!
//! ```no_run
//! use slant_edge_mtf::{AnalysisContext, Config, Frame};
//!
//! let frame = Frame::open("edge.tif")?;
//! let context = AnalysisContext::new(Config::default().pixel_pitch_um(5.5))?;
//! let result = context.analyse_frame(&frame, [640., 512.])?;
//! println!("{}", result.summary("edge.tif"));
//! # Ok::<(), slant_edge_mtf::Error>(())
//! ```

pub mod config;
pub mod curve;
pub mod edge;
pub mod error;
pub mod esf;
pub mod export;
pub mod fft;
pub mod fit;
pub mod focus;
pub mod image;
pub mod lsf;
pub mod metrics;
pub mod mtf;
pub mod noise;
pub mod pipeline;
pub mod refine;
pub mod savgol;

pub use config::{Config, NyquistMode};
pub use curve::{Curve, EsfCurve, LsfCurve};
pub use edge::{locate_edge, EdgeLine};
pub use error::{Error, Result};
pub use esf::EsfPoint;
pub use crate::image::{Aoi, Frame};
pub use metrics::EdgeWidthMetrics;
pub use mtf::{MtfCurves, MtfSample};
pub use pipeline::{
    average_mtf, AnalysisContext, AnalysisResult, AnalysisSummary, AveragedMtf, EdgeSamples,
    FieldPosition,
};
