//! Control mechanics: the stepped updates both tuning phases apply.

/// |frequency error| at or below which fine tuning stops (Hz).
pub const FREQUENCY_TOLERANCE: f64 = 0.0005;

/// (upper bound of |error|, length step) pairs, checked in order.
pub const FREQUENCY_BANDS: [(f64, f64); 5] = [
    (0.002, 0.1),
    (0.005, 0.5),
    (0.01, 1.0),
    (0.025, 2.0),
    (f64::INFINITY, 3.0),
];

/// Length step for a frequency error magnitude; `None` inside tolerance.
#[inline]
pub fn band_step(error_abs: f64) -> Option<f64> {
    if error_abs <= FREQUENCY_TOLERANCE {
        return None;
    }
    FREQUENCY_BANDS.iter().find(|(hi, _)| error_abs <= *hi).map(|(_, step)| *step)
}

/// Fine-tuning law. `error = f_candidate − f_baseline`: a candidate below the
/// baseline lengthens the line, one above it shortens the line.
#[inline]
pub fn length_update(length: f64, error: f64) -> f64 {
    match band_step(error.abs()) {
        None => length,
        Some(step) if error < 0.0 => length + step,
        Some(step) => length - step,
    }
}

/// Rough-sizing law: fixed increment.
#[inline]
pub fn fixed_step(length: f64, step: f64) -> f64 {
    length + step
}
