//! Uplift mechanics: seabed clearance of the anchor-end node of each line.

/// Worst clearance `min(z) + depth` over all samples; `-inf` when empty.
#[inline]
pub fn seabed_margin(z: &[f64], water_depth: f64) -> f64 {
    if z.is_empty() {
        return f64::NEG_INFINITY;
    }
    z.iter().fold(f64::INFINITY, |m, v| m.min(*v)) + water_depth
}

/// Uplift-free: every sample of every line satisfies `z >= -water_depth`.
/// A line with no samples cannot satisfy it.
#[inline]
pub fn no_uplift<Z: AsRef<[f64]>>(lines: &[Z], water_depth: f64) -> bool {
    !lines.is_empty() && lines.iter().all(|z| seabed_margin(z.as_ref(), water_depth) >= 0.0)
}
