//! Dominant oscillation frequency of a sampled motion signal.
//!
//! The signal is de-meaned, zero-padded to a power of two and transformed with
//! an in-place radix-2 FFT. The peak magnitude bin (DC excluded) is refined by
//! fitting a parabola through it and its neighbours.

use std::f64::consts::PI;

use num_complex::Complex64;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SpectrumError {
    #[error("need at least {min} samples for a spectrum, got {got}")]
    TooShort { min: usize, got: usize },

    #[error("time and signal lengths differ ({time} vs {signal})")]
    LengthMismatch { time: usize, signal: usize },

    #[error("sample spacing must be positive, got {0}")]
    BadSpacing(f64),

    #[error("signal has no oscillating content")]
    Flat,
}

const MIN_SAMPLES: usize = 4;

/// Frequency (Hz) of the strongest non-DC spectral component.
pub fn dominant_frequency(time: &[f64], signal: &[f64]) -> Result<f64, SpectrumError> {
    if time.len() != signal.len() {
        return Err(SpectrumError::LengthMismatch { time: time.len(), signal: signal.len() });
    }
    let n = signal.len();
    if n < MIN_SAMPLES {
        return Err(SpectrumError::TooShort { min: MIN_SAMPLES, got: n });
    }
    let dt = (time[n - 1] - time[0]) / (n - 1) as f64;
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(SpectrumError::BadSpacing(dt));
    }

    let mag = magnitudes(signal);
    let size = mag.len();
    let half = size / 2;
    let (k, peak) = (1..=half)
        .map(|k| (k, mag[k]))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    let scale = signal.iter().fold(1.0f64, |m, v| m.max(v.abs()));
    if k == 0 || peak <= 1e-9 * scale * n as f64 {
        return Err(SpectrumError::Flat);
    }

    let offset = if k > 1 && k < half {
        let (a, b, c) = (mag[k - 1], mag[k], mag[k + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON { 0.5 * (a - c) / denom } else { 0.0 }
    } else {
        0.0
    };
    Ok((k as f64 + offset) / (size as f64 * dt))
}

/// |X_k| of the de-meaned, zero-padded signal.
pub fn magnitudes(signal: &[f64]) -> Vec<f64> {
    let mean = signal.iter().sum::<f64>() / signal.len().max(1) as f64;
    let size = signal.len().next_power_of_two();
    let mut buf: Vec<Complex64> = signal
        .iter()
        .map(|v| Complex64::new(v - mean, 0.0))
        .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
        .take(size)
        .collect();
    fft(&mut buf);
    buf.iter().map(|c| c.norm()).collect()
}

/// In-place iterative Cooley–Tukey; `buf.len()` must be a power of two.
fn fft(buf: &mut [Complex64]) {
    let n = buf.len();
    if n < 2 {
        return;
    }
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            buf.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let w_len = Complex64::from_polar(1.0, -2.0 * PI / len as f64);
        for start in (0..n).step_by(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for j in 0..len / 2 {
                let u = buf[start + j];
                let v = buf[start + j + len / 2] * w;
                buf[start + j] = u + v;
                buf[start + j + len / 2] = u - v;
                w *= w_len;
            }
        }
        len <<= 1;
    }
}
