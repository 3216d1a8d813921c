//! Input deck: the MoorDyn, HydroDyn and `.fst` files one simulator run needs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::Phase;
use crate::error::Result;
use crate::io::template::{MismatchPolicy, Patch, Template, quoted};
use crate::mechanics::catenary::MooringGeometry;
use crate::platform::{LINE_COUNT, Platform};

pub const MOORDYN_FILE: &str = "moordyn.dat";
pub const HYDRODYN_FILE: &str = "hydrodyn.dat";

#[derive(Clone, Debug)]
pub struct InputDeck {
    template_dir: PathBuf,
    platform: Platform,
    geometry: MooringGeometry,
    policy: MismatchPolicy,
}

impl InputDeck {
    pub fn new(template_dir: impl Into<PathBuf>, platform: &Platform, geometry: MooringGeometry) -> Self {
        Self {
            template_dir: template_dir.into(),
            platform: *platform,
            geometry,
            policy: MismatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn geometry(&self) -> &MooringGeometry {
        &self.geometry
    }

    pub fn template(&self, name: &str) -> PathBuf {
        self.template_dir.join(name)
    }

    /// Line length for every line plus the anchor position of each line's
    /// anchor node (connection rows 1..=3).
    pub fn moordyn_patch(&self, line_length: f64) -> Patch {
        let anchors = &self.geometry.anchors;
        let z = self.geometry.anchor_z();
        Patch::new()
            .indexed("UnstrLen", per_line(|_| line_length))
            .indexed("X", per_line(|i| anchors[i].0))
            .indexed("Y", per_line(|i| anchors[i].1))
            .indexed("Z", per_line(|_| z))
    }

    /// Writes the MoorDyn file for `line_length` to `output`.
    pub fn write_moordyn(&self, output: &Path, line_length: f64) -> Result<()> {
        let mut moordyn = Template::load(self.template(self.platform.templates.moordyn))?.with_policy(self.policy);
        moordyn.apply(&self.moordyn_patch(line_length))?;
        moordyn.write(output)?;
        Ok(())
    }

    /// Writes the full deck for one run into `dir` and returns the `.fst`
    /// path to hand to the simulator.
    pub fn write(&self, dir: &Path, phase: Phase, line_length: f64) -> Result<PathBuf> {
        let moordyn = dir.join(MOORDYN_FILE);
        self.write_moordyn(&moordyn, line_length)?;

        let hydrodyn = dir.join(HYDRODYN_FILE);
        let mut hydro = Template::load(self.template(self.platform.templates.hydrodyn))?.with_policy(self.policy);
        hydro.rebase_file_refs(&self.template_dir);
        hydro.apply_rows(&Patch::new().scalar("WtrDpth", self.geometry.water_depth))?;
        hydro.write(&hydrodyn)?;

        let (fst_template, fst_name) = match phase {
            Phase::Rough => (self.platform.templates.rough_fst, "rough.fst"),
            Phase::Fine => (self.platform.templates.fine_fst, "fine.fst"),
        };
        let fst = dir.join(fst_name);
        let mut main = Template::load(self.template(fst_template))?.with_policy(self.policy);
        let rebased = main.rebase_file_refs(&self.template_dir);
        main.apply_rows(
            &Patch::new()
                .scalar("HydroFile", quoted(&hydrodyn))
                .scalar("MooringFile", quoted(&moordyn)),
        )?;
        main.write(&fst)?;
        debug!(%phase, line_length, dir = %dir.display(), rebased, "wrote input deck");
        Ok(fst)
    }
}

fn per_line(value: impl Fn(usize) -> f64) -> Vec<(String, String)> {
    (0..LINE_COUNT).map(|i| ((i + 1).to_string(), value(i).to_string())).collect()
}
