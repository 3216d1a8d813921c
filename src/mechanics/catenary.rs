//! Catenary sizing of chain mooring lines (Kim et al., 2014).
//!
//! `T`  proof load of the chain, `w` submerged weight per metre, `h` depth.
//! Initial length `L = h √(2T/(wh) − 1)`; horizontal fairlead–anchor span
//! `x = (T_h/w) acosh(1 + wh/T_h)` with `T_h = T − wh`.

use thiserror::Error;

use crate::platform::{LINE_COUNT, LineProperties, Platform};

pub const GRAVITY: f64 = 9.80665;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("water depth must be finite and non-negative, got {0}")]
    InvalidDepth(f64),

    #[error("line properties must be positive (mass density {mass_density} kg/m, diameter {diameter_mm} mm)")]
    InvalidLine { mass_density: f64, diameter_mm: f64 },

    #[error("proof load {proof_load:.0} N does not exceed the suspended weight {weight:.0} N at depth {depth} m")]
    Overloaded { proof_load: f64, weight: f64, depth: f64 },

    #[error("catenary argument {argument} is outside the domain of {function}")]
    Domain { function: &'static str, argument: f64 },
}

/// Chain proof load in newtons; `diameter_mm` in millimetres.
#[inline]
pub fn proof_load(diameter_mm: f64) -> f64 {
    0.0156 * diameter_mm.powi(2) * (44.0 - 0.08 * diameter_mm) * 1_000.0
}

/// Weight per unit length in N/m.
#[inline]
pub fn weight_per_length(mass_density: f64) -> f64 {
    mass_density * GRAVITY
}

fn check(line: &LineProperties, depth: f64) -> Result<(f64, f64), GeometryError> {
    if !depth.is_finite() || depth < 0.0 {
        return Err(GeometryError::InvalidDepth(depth));
    }
    if !(line.mass_density > 0.0 && line.diameter_mm > 0.0) {
        return Err(GeometryError::InvalidLine {
            mass_density: line.mass_density,
            diameter_mm: line.diameter_mm,
        });
    }
    Ok((proof_load(line.diameter_mm), weight_per_length(line.mass_density)))
}

/// Starting guess for the unstretched line length.
pub fn initial_line_length(line: &LineProperties, depth: f64) -> Result<f64, GeometryError> {
    let (t_max, w) = check(line, depth)?;
    if depth == 0.0 {
        return Err(GeometryError::InvalidDepth(depth));
    }
    let arg = 2.0 * t_max / (w * depth) - 1.0;
    if arg < 0.0 {
        return Err(GeometryError::Domain { function: "sqrt", argument: arg });
    }
    Ok(depth * arg.sqrt())
}

/// Horizontal distance between fairlead and anchor.
pub fn horizontal_offset(line: &LineProperties, depth: f64) -> Result<f64, GeometryError> {
    let (t_max, w) = check(line, depth)?;
    let t_h = t_max - w * depth;
    if t_h <= 0.0 {
        return Err(GeometryError::Overloaded { proof_load: t_max, weight: w * depth, depth });
    }
    let arg = 1.0 + w * depth / t_h;
    if !(arg >= 1.0) {
        return Err(GeometryError::Domain { function: "acosh", argument: arg });
    }
    Ok(t_h / w * arg.acosh())
}

/// Anchor layout for one tuning session.
#[derive(Clone, Debug, PartialEq)]
pub struct MooringGeometry {
    pub water_depth: f64,
    pub horizontal_offset: f64,
    pub anchors: [(f64, f64); LINE_COUNT],
}

impl MooringGeometry {
    pub fn compute(platform: &Platform, water_depth: f64) -> Result<Self, GeometryError> {
        let offset = horizontal_offset(&platform.line, water_depth)?;
        let anchors = std::array::from_fn(|i| {
            let (fx, fy) = platform.fairleads[i];
            let psi = platform.headings_deg[i].to_radians();
            (fx + offset * psi.cos(), fy + offset * psi.sin())
        });
        Ok(Self { water_depth, horizontal_offset: offset, anchors })
    }

    /// Anchor depth as written to the mooring file.
    pub fn anchor_z(&self) -> f64 {
        -self.water_depth
    }
}
