//! Built-in floating platform definitions.

use crate::error::{Error, Result};

/// Every supported platform is moored by three catenary lines.
pub const LINE_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineProperties {
    /// kg/m
    pub mass_density: f64,
    /// Nominal chain diameter, mm.
    pub diameter_mm: f64,
}

/// Template and baseline file names, relative to the template directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateSet {
    pub moordyn: &'static str,
    pub hydrodyn: &'static str,
    pub rough_fst: &'static str,
    pub fine_fst: &'static str,
    pub baseline_outb: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Platform {
    pub name: &'static str,
    pub line: LineProperties,
    /// Fairlead (x, y) per line, m.
    pub fairleads: [(f64, f64); LINE_COUNT],
    /// Line heading per line, degrees from +x.
    pub headings_deg: [f64; LINE_COUNT],
    pub templates: TemplateSet,
}

pub const OC3: Platform = Platform {
    name: "OC3",
    line: LineProperties { mass_density: 77.7066, diameter_mm: 90.0 },
    fairleads: [(5.2, 0.0), (-2.6, 4.5), (-2.6, -4.5)],
    headings_deg: [0.0, 120.0, 240.0],
    templates: TemplateSet {
        moordyn: "moordyn_template_oc3.dat",
        hydrodyn: "hydrodyn_template_oc3.dat",
        rough_fst: "template_rough_oc3.fst",
        fine_fst: "template_fine_oc3.fst",
        baseline_outb: "rbm_baseline_oc3.outb",
    },
};

pub const OC4: Platform = Platform {
    name: "OC4",
    line: LineProperties { mass_density: 113.35, diameter_mm: 76.6 },
    fairleads: [(20.434, 35.393), (-40.868, 0.0), (20.434, -35.393)],
    headings_deg: [60.0, 180.0, 300.0],
    templates: TemplateSet {
        moordyn: "moordyn_template_oc4.dat",
        hydrodyn: "hydrodyn_template_oc4.dat",
        rough_fst: "template_rough_oc4.fst",
        fine_fst: "template_fine_oc4.fst",
        baseline_outb: "rbm_baseline_oc4.outb",
    },
};

pub const PLATFORMS: [&Platform; 2] = [&OC3, &OC4];

impl Platform {
    /// Case-insensitive lookup by name.
    pub fn lookup(name: &str) -> Result<&'static Platform> {
        PLATFORMS
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::UnknownPlatform(name.to_string()))
    }

    /// `L{i}N1PZ`: vertical position of the anchor-end node of each line.
    pub fn anchor_node_channels(&self) -> [String; LINE_COUNT] {
        std::array::from_fn(|i| format!("L{}N1PZ", i + 1))
    }
}
