use crate::{esf::SMOOTHING_ORDER, Error, Result};
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// MTF reference frequency reported alongside the curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NyquistMode {
    /// Half the detector Nyquist frequency
    #[default]
    Half,
    /// The detector Nyquist frequency
    Full,
}
impl NyquistMode {
    /// Fraction of the Nyquist frequency
    pub fn fraction(&self) -> f64 {
        match self {
            NyquistMode::Half => 0.5,
            NyquistMode::Full => 1.0,
        }
    }
}

/// Slant-edge analysis settings
///
/// Built from [Config::default] with the consuming setters:
/// ```
/// use slant_edge_mtf::{Config, NyquistMode};
/// let config = Config::default()
///     .oversampling(4)
///     .pixel_pitch_um(5.5)
///     .nyquist(NyquistMode::Full);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// ESF samples per pixel
    pub oversampling: usize,
    /// Largest perpendicular distance to the edge of an ESF sample [px]
    pub normal_distance: f64,
    /// Length of the edge segment used to build the ESF [px]
    pub edge_length: f64,
    /// Discard raw ESF samples outside the noise band
    pub remove_noise: bool,
    /// Noise band scaling factor
    pub sigma_scaling: f64,
    /// Plain averaging of the ESF far tails
    pub tail_smoothing: bool,
    /// Tail start distance in units of the largest 10%/90% crossing distance
    pub tail_start_factor: f64,
    /// Half-width of the tail averaging window [px]
    pub tail_smooth_width: f64,
    /// Gaussian kernel exponent of the ESF rebuild
    pub smoothing_alpha: f64,
    /// Detector pixel pitch [micron]
    pub pixel_pitch_um: f64,
    pub nyquist: NyquistMode,
    /// Replace isolated hot/dead pixels before locating the edge
    pub bad_pixel_remove: bool,
    /// Bad pixel threshold in units of the AOI standard deviation
    pub bad_pixel_factor: f64,
    /// Re-center the AOI on the located edge
    pub dynamic_aoi: bool,
    /// AOI side length [px]
    pub aoi_size: usize,
    pub refine_iterations: usize,
    /// AOI re-centering is skipped below this center to edge distance [px]
    pub refine_tolerance_px: f64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            oversampling: 4,
            normal_distance: 10.,
            edge_length: 40.,
            remove_noise: true,
            sigma_scaling: 3.,
            tail_smoothing: false,
            tail_start_factor: 2.,
            tail_smooth_width: 1.,
            smoothing_alpha: 5.,
            pixel_pitch_um: 7.7,
            nyquist: NyquistMode::Half,
            bad_pixel_remove: false,
            bad_pixel_factor: 3.,
            dynamic_aoi: true,
            aoi_size: 64,
            refine_iterations: 2,
            refine_tolerance_px: 2.,
        }
    }
}
impl Config {
    pub fn oversampling(self, oversampling: usize) -> Self {
        Self {
            oversampling,
            ..self
        }
    }
    pub fn normal_distance(self, normal_distance: f64) -> Self {
        Self {
            normal_distance,
            ..self
        }
    }
    pub fn edge_length(self, edge_length: f64) -> Self {
        Self {
            edge_length,
            ..self
        }
    }
    pub fn remove_noise(self, remove_noise: bool) -> Self {
        Self {
            remove_noise,
            ..self
        }
    }
    pub fn sigma_scaling(self, sigma_scaling: f64) -> Self {
        Self {
            sigma_scaling,
            ..self
        }
    }
    /// Enables tail smoothing starting at `start_factor` times the 10%/90% distance
    /// and averaging over `width` pixels on either side of a grid point
    pub fn tail_smoothing(self, start_factor: f64, width: f64) -> Self {
        Self {
            tail_smoothing: true,
            tail_start_factor: start_factor,
            tail_smooth_width: width,
            ..self
        }
    }
    pub fn smoothing_alpha(self, smoothing_alpha: f64) -> Self {
        Self {
            smoothing_alpha,
            ..self
        }
    }
    pub fn pixel_pitch_um(self, pixel_pitch_um: f64) -> Self {
        Self {
            pixel_pitch_um,
            ..self
        }
    }
    pub fn nyquist(self, nyquist: NyquistMode) -> Self {
        Self { nyquist, ..self }
    }
    pub fn bad_pixel_removal(self, factor: f64) -> Self {
        Self {
            bad_pixel_remove: true,
            bad_pixel_factor: factor,
            ..self
        }
    }
    pub fn dynamic_aoi(self, dynamic_aoi: bool) -> Self {
        Self {
            dynamic_aoi,
            ..self
        }
    }
    pub fn aoi_size(self, aoi_size: usize) -> Self {
        Self { aoi_size, ..self }
    }
    /// Sets the AOI re-centering iteration budget and convergence distance
    pub fn refine(self, iterations: usize, tolerance_px: f64) -> Self {
        Self {
            refine_iterations: iterations,
            refine_tolerance_px: tolerance_px,
            ..self
        }
    }
    /// Checks the settings before any computation
    pub fn validate(&self) -> Result<()> {
        let positive = |value: f64, name: &str| {
            if value.is_finite() && value > 0. {
                Ok(())
            } else {
                Err(Error::config(format!("{name} must be positive, found {value}")))
            }
        };
        if self.oversampling < 1 {
            return Err(Error::config("oversampling must be at least 1"));
        }
        let window = self.smoothing_window();
        if window < SMOOTHING_ORDER + 2 {
            return Err(Error::config(format!(
                "smoothing window of {window} samples (oversampling {}) is too small for a polynomial of order {SMOOTHING_ORDER}",
                self.oversampling
            )));
        }
        if self.aoi_size < 4 {
            return Err(Error::config(format!(
                "AOI size must be at least 4px, found {}",
                self.aoi_size
            )));
        }
        positive(self.normal_distance, "normal distance")?;
        positive(self.edge_length, "edge length")?;
        positive(self.sigma_scaling, "sigma scaling factor")?;
        positive(self.smoothing_alpha, "smoothing alpha")?;
        positive(self.pixel_pitch_um, "pixel pitch")?;
        positive(self.bad_pixel_factor, "bad pixel factor")?;
        if self.tail_smoothing {
            positive(self.tail_smooth_width, "tail smoothing width")?;
            if !(self.tail_start_factor.is_finite() && self.tail_start_factor >= 0.) {
                return Err(Error::config("tail start factor must be non-negative"));
            }
        }
        if !(self.refine_tolerance_px.is_finite() && self.refine_tolerance_px >= 0.) {
            return Err(Error::config("AOI refine tolerance must be non-negative"));
        }
        Ok(())
    }
    /// Savitzky-Golay window length: `oversampling+1`, bumped to the next odd length
    pub fn smoothing_window(&self) -> usize {
        let window = self.oversampling + 1;
        if window % 2 == 0 {
            window + 1
        } else {
            window
        }
    }
    /// Grid spacing of the oversampled curves [px]
    pub fn grid_step(&self) -> f64 {
        (self.oversampling as f64).recip()
    }
    /// Pixel sampling frequency [cycles/mm]
    pub fn pixel_frequency(&self) -> f64 {
        1e3 / self.pixel_pitch_um
    }
    /// Detector Nyquist frequency [cycles/mm]
    pub fn nyquist_frequency(&self) -> f64 {
        0.5 * self.pixel_frequency()
    }
    /// Frequency the MTF is reported at [cycles/mm]
    pub fn reference_frequency(&self) -> f64 {
        self.nyquist.fraction() * self.nyquist_frequency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
    #[test]
    fn rejects_zero_oversampling() {
        let config = Config::default().oversampling(0);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
    #[test]
    fn rejects_undersized_smoothing_window() {
        for oversampling in [1, 2] {
            let config = Config::default().oversampling(oversampling);
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfiguration(_))
            ));
        }
        assert!(Config::default().oversampling(3).validate().is_ok());
    }
    #[test]
    fn rejects_non_positive_pitch() {
        let config = Config::default().pixel_pitch_um(0.);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
    #[test]
    fn smoothing_window_is_odd() {
        for oversampling in 1..12 {
            let window = Config::default()
                .oversampling(oversampling)
                .smoothing_window();
            assert_eq!(window % 2, 1);
            assert!(window >= oversampling + 1);
        }
        assert_eq!(Config::default().oversampling(2).smoothing_window(), 3);
        assert_eq!(Config::default().oversampling(4).smoothing_window(), 5);
        assert_eq!(Config::default().oversampling(8).smoothing_window(), 9);
    }
    #[test]
    fn nyquist_mode_from_str() {
        assert_eq!(NyquistMode::from_str("half").unwrap(), NyquistMode::Half);
        assert_eq!(NyquistMode::from_str("full").unwrap(), NyquistMode::Full);
        assert_eq!(NyquistMode::Full.to_string(), "full");
    }
    #[test]
    fn reference_frequency() {
        let config = Config::default().pixel_pitch_um(10.);
        assert!((config.reference_frequency() - 25.).abs() < 1e-12);
        let config = config.nyquist(NyquistMode::Full);
        assert!((config.reference_frequency() - 50.).abs() < 1e-12);
    }
}
