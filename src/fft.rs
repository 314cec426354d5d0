//! Radix-2 discrete Fourier transform

use nalgebra::Complex;
use std::f64::consts::PI;

/// In-place Cooley-Tukey FFT, the length of `data` must be a power of 2
pub fn fft_in_place(data: &mut [Complex<f64>]) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two(), "FFT length must be a power of 2");
    // bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            data.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = -2. * PI / len as f64;
        let w = Complex::new(angle.cos(), angle.sin());
        for chunk in data.chunks_mut(len) {
            let mut twiddle = Complex::new(1., 0.);
            for k in 0..half {
                let u = chunk[k];
                let v = chunk[k + half] * twiddle;
                chunk[k] = u + v;
                chunk[k + half] = u - v;
                twiddle *= w;
            }
        }
        len <<= 1;
    }
}

/// FFT length: the smallest power of 2, at least 64, exceeding `len`
pub fn fft_len(len: usize) -> usize {
    (len + 1).next_power_of_two().max(64)
}

/// Magnitude of the DFT of `signal` zero-padded (or truncated) to `n` samples
pub fn magnitude(signal: &[f64], n: usize) -> Vec<f64> {
    let mut data: Vec<Complex<f64>> = signal
        .iter()
        .take(n)
        .map(|&x| Complex::new(x, 0.))
        .chain(std::iter::repeat(Complex::new(0., 0.)))
        .take(n)
        .collect();
    fft_in_place(&mut data);
    data.iter().map(|z| z.re.hypot(z.im)).collect()
}

/// DFT sample frequencies of an `n` samples signal with sampling interval `d`
///
/// Positive frequencies first, then the negative ones.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = (n as f64 * d).recip();
    let positive = (n - 1) / 2 + 1;
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64
            } else {
                i as f64 - n as f64
            }
        })
        .map(|k| k * scale)
        .collect()
}
