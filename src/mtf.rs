//! Modulation Transfer Function
//!
//! The MTF is the normalized magnitude of the LSF Fourier transform. The
//! system MTF is corrected for the finite width of the ESF averaging and the
//! optical MTF is the system MTF with the detector pixel aperture removed.

use crate::{fft, Config, Curve, Error, LsfCurve, Result};
use serde::Serialize;
use std::f64::consts::PI;

/// `sin(πx)/(πx)`
pub fn sinc(x: f64) -> f64 {
    if x == 0. {
        1.
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// MTF values at a given frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MtfSample {
    /// [cycles/mm]
    pub frequency: f64,
    pub system: f64,
    pub optical: f64,
}

/// System, detector and optical MTFs on the non-negative DFT frequencies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MtfCurves {
    /// [cycles/mm]
    pub frequency: Vec<f64>,
    pub system: Vec<f64>,
    /// Pixel aperture MTF
    pub detector: Vec<f64>,
    /// System MTF divided by the detector MTF, meaningless beyond the pixel frequency
    pub optical: Vec<f64>,
    /// Detector Nyquist frequency [cycles/mm]
    pub nyquist: f64,
    /// Frequency the MTF is reported at [cycles/mm]
    pub reference_frequency: f64,
}
impl MtfCurves {
    pub fn len(&self) -> usize {
        self.frequency.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
    pub fn system_curve(&self) -> Result<Curve> {
        Curve::new(self.frequency.clone(), self.system.clone())
    }
    pub fn optical_curve(&self) -> Result<Curve> {
        Curve::new(self.frequency.clone(), self.optical.clone())
    }
    /// Linearly interpolated MTFs at `frequency` [cycles/mm]
    pub fn at(&self, frequency: f64) -> Option<MtfSample> {
        Some(MtfSample {
            frequency,
            system: self.system_curve().ok()?.interp(frequency)?,
            optical: self.optical_curve().ok()?.interp(frequency)?,
        })
    }
    /// MTFs at the configured half or full Nyquist frequency
    pub fn reference_value(&self) -> Option<MtfSample> {
        self.at(self.reference_frequency)
    }
    /// MTFs at `fraction` of the Nyquist frequency
    pub fn at_nyquist_fraction(&self, fraction: f64) -> Option<MtfSample> {
        self.at(fraction * self.nyquist)
    }
}

/// Transforms the LSF into the MTFs
///
/// `width_10_90` is the ESF 10%-90% edge width [px] used for the ESF averaging
/// correction. That correction divides by `sinc(width_10_90·f/(oversampling·f_pixel))`,
/// which vanishes at `f = oversampling·f_pixel/width_10_90`: the system MTF is only
/// meaningful below that frequency and below the pixel frequency, beyond which it
/// spikes and changes sign. With the default 4x oversampling an edge wider than 2px
/// puts that zero inside the returned frequency range.
pub fn transform(lsf: &LsfCurve, width_10_90: f64, config: &Config) -> Result<MtfCurves> {
    if lsf.is_empty() {
        return Err(Error::DegenerateResampleGrid);
    }
    let n = fft::fft_len(lsf.len());
    let sampling_interval = config.pixel_pitch_um * 1e-3 * lsf.span() / lsf.len() as f64;
    if !(sampling_interval > 0.) {
        return Err(Error::DegenerateResampleGrid);
    }
    let half = n / 2;
    let mut spectrum = fft::magnitude(lsf.values(), n);
    spectrum.truncate(half);
    let mut frequency = fft::fftfreq(n, sampling_interval);
    frequency.truncate(half);

    let pixel_frequency = config.pixel_frequency();
    let oversampling = config.oversampling as f64;
    let detector: Vec<f64> = frequency
        .iter()
        .map(|f| sinc(f / pixel_frequency))
        .collect();
    let corrected: Vec<f64> = spectrum
        .iter()
        .zip(&frequency)
        .map(|(a, f)| a / sinc(width_10_90 * f / oversampling / pixel_frequency))
        .collect();
    let dc = corrected[0];
    if !(dc.is_finite() && dc > 0.) {
        return Err(Error::FlatCurveMetric);
    }
    let system: Vec<f64> = corrected.iter().map(|a| a / dc).collect();
    let optical: Vec<f64> = system.iter().zip(&detector).map(|(s, d)| s / d).collect();
    log::debug!(
        "MTF: {} bins up to {:.1} cycles/mm (FFT length: {n})",
        half,
        frequency.last().copied().unwrap_or_default()
    );
    Ok(MtfCurves {
        frequency,
        system,
        detector,
        optical,
        nyquist: config.nyquist_frequency(),
        reference_frequency: config.reference_frequency(),
    })
}
