use crate::{Error, Result};
use nalgebra::DMatrix;
use std::path::Path;

pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.is_empty() {
        return (0., 0.);
    }
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|x| x - mean).fold(0f64, |s, x| s + x * x) / n).sqrt();
    (mean, std)
}

/// Full detector frame
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: DMatrix<u16>,
}
impl Frame {
    /// Builds a frame from row-major samples
    pub fn from_row_slice(width: usize, height: usize, data: &[u16]) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::config(format!(
                "expected {}x{} samples, found {}",
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            pixels: DMatrix::from_row_slice(height, width, data),
        })
    }
    /// Loads a grayscale image file, 8-bit images are promoted to 16-bit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading {:?}...", path.as_ref());
        let image = image::open(path)?.into_luma16();
        let (width, height) = image.dimensions();
        Self::from_row_slice(width as usize, height as usize, image.as_raw())
    }
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }
    /// Crops a square AOI of side `2*((size-1)/2)+1` centered on `center` (x,y),
    /// clipped to the frame
    pub fn crop(&self, center: [f64; 2], size: usize) -> Result<Aoi> {
        let half = (size.max(1) - 1) / 2;
        let (cx, cy) = (center[0].round(), center[1].round());
        let (w, h) = (self.width() as f64, self.height() as f64);
        if !(cx >= 0. && cx < w && cy >= 0. && cy < h) {
            return Err(Error::config(format!(
                "AOI center ({cx},{cy}) is outside the {w}x{h} frame"
            )));
        }
        let (cx, cy) = (cx as usize, cy as usize);
        let left = cx.saturating_sub(half);
        let top = cy.saturating_sub(half);
        let right = (cx + half).min(self.width() - 1);
        let bottom = (cy + half).min(self.height() - 1);
        let pixels = self
            .pixels
            .view((top, left), (bottom - top + 1, right - left + 1))
            .into_owned();
        Ok(Aoi {
            pixels,
            origin: [left, top],
        })
    }
}

/// Area of interest containing one straight edge
///
/// Pixel `(x,y)` is at column `x` and row `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    pixels: DMatrix<u16>,
    origin: [usize; 2],
}
impl Aoi {
    /// Builds an AOI from row-major samples
    pub fn from_row_slice(width: usize, height: usize, data: &[u16]) -> Result<Self> {
        let Frame { pixels } = Frame::from_row_slice(width, height, data)?;
        Ok(Self {
            pixels,
            origin: [0, 0],
        })
    }
    /// Builds an AOI from the function `f(x,y)`
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> u16,
    {
        Self {
            pixels: DMatrix::from_fn(height, width, |y, x| f(x, y)),
            origin: [0, 0],
        }
    }
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }
    /// Frame coordinates (x,y) of the AOI top-left pixel
    pub fn origin(&self) -> [usize; 2] {
        self.origin
    }
    /// Geometric center (x,y) in AOI coordinates
    pub fn center(&self) -> [f64; 2] {
        [
            (self.width() as f64 - 1.) * 0.5,
            (self.height() as f64 - 1.) * 0.5,
        ]
    }
    /// Geometric center (x,y) in frame coordinates
    pub fn frame_center(&self) -> [f64; 2] {
        let [x, y] = self.center();
        [x + self.origin[0] as f64, y + self.origin[1] as f64]
    }
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.pixels[(y, x)]
    }
    /// Samples of row `y`
    pub fn row(&self, y: usize) -> Vec<f64> {
        (0..self.width()).map(|x| self.get(x, y) as f64).collect()
    }
    /// Iterator over ((x,y), sample)
    pub fn pixels(&self) -> impl Iterator<Item = ([usize; 2], u16)> + '_ {
        (0..self.height())
            .flat_map(move |y| (0..self.width()).map(move |x| ([x, y], self.get(x, y))))
    }
    /// Population standard deviation of the whole AOI
    pub fn std(&self) -> f64 {
        let values: Vec<f64> = self.pixels.iter().map(|&v| v as f64).collect();
        mean_std(&values).1
    }
    /// Population standard deviation of row `y`
    pub fn row_std(&self, y: usize) -> f64 {
        mean_std(&self.row(y)).1
    }
    /// Replaces isolated hot and dead pixels
    ///
    /// A pixel that differs from every in-frame 8-neighbor by more than
    /// `factor` times the AOI standard deviation takes the mean of those neighbors.
    /// Two passes are applied, each one updating pixels in place, column by column.
    pub fn remove_bad_pixels(&self, factor: f64) -> Self {
        let threshold = self.std() * factor;
        let mut pixels = self.pixels.clone();
        let (h, w) = pixels.shape();
        let mut n_replaced = 0usize;
        for _ in 0..2 {
            for x in 0..w {
                for y in 0..h {
                    let value = pixels[(y, x)] as f64;
                    let neighbors: Vec<f64> = (-1i64..=1)
                        .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
                        .filter(|&d| d != (0, 0))
                        .filter_map(|(dx, dy)| {
                            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                            (nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h)
                                .then(|| pixels[(ny as usize, nx as usize)] as f64)
                        })
                        .collect();
                    if !neighbors.is_empty()
                        && neighbors.iter().all(|n| (value - n).abs() > threshold)
                    {
                        let mean = neighbors.iter().sum::<f64>() / neighbors.len() as f64;
                        pixels[(y, x)] = mean as u16;
                        n_replaced += 1;
                    }
                }
            }
        }
        log::debug!("replaced {n_replaced} bad pixels");
        Self {
            pixels,
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_centered_and_clipped() {
        let data: Vec<u16> = (0..100 * 80).map(|i| i as u16).collect();
        let frame = Frame::from_row_slice(100, 80, &data).unwrap();
        let aoi = frame.crop([50., 40.], 21).unwrap();
        assert_eq!((aoi.width(), aoi.height()), (21, 21));
        assert_eq!(aoi.origin(), [40, 30]);
        assert_eq!(aoi.get(0, 0), (30 * 100 + 40) as u16);
        assert_eq!(aoi.frame_center(), [50., 40.]);
        let corner = frame.crop([2., 1.], 21).unwrap();
        assert_eq!((corner.width(), corner.height()), (13, 12));
        assert_eq!(corner.origin(), [0, 0]);
        assert!(frame.crop([150., 10.], 21).is_err());
    }
    #[test]
    fn row_major_layout() {
        let aoi = Aoi::from_row_slice(3, 2, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(aoi.get(2, 0), 3);
        assert_eq!(aoi.get(0, 1), 4);
        assert_eq!(aoi.row(1), vec![4., 5., 6.]);
        assert!(Aoi::from_row_slice(3, 3, &[0; 6]).is_err());
    }
    #[test]
    fn standard_deviations() {
        let aoi = Aoi::from_fn(4, 3, |x, _| if x < 2 { 0 } else { 10 });
        assert!((aoi.std() - 5.).abs() < 1e-12);
        assert!((aoi.row_std(1) - 5.).abs() < 1e-12);
        let flat = Aoi::from_fn(4, 3, |_, _| 7);
        assert_eq!(flat.std(), 0.);
    }
    #[test]
    fn hot_pixel_is_replaced() {
        let mut aoi = Aoi::from_fn(9, 9, |x, y| 1000 + ((x + 2 * y) % 3) as u16);
        aoi.pixels[(4, 4)] = 60000;
        let clean = aoi.remove_bad_pixels(1.);
        assert!(clean.get(4, 4) <= 1002);
        assert_eq!(clean.get(0, 0), aoi.get(0, 0));
    }
    #[test]
    fn edge_pixels_are_kept() {
        let aoi = Aoi::from_fn(10, 10, |x, _| if x < 5 { 100 } else { 50000 });
        assert_eq!(aoi.remove_bad_pixels(0.5), aoi);
    }
}
