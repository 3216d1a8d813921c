// src/sessions/mooring.rs

//! Mooring session orchestrator.
//!
//! Coordinates the two line-length systems for one platform at one depth:
//! - `rough` → first uplift-free length, starting from the catenary estimate
//! - `fine`  → decay-frequency match against the baseline run, starting from
//!   the rough result
//!
//! The anchor layout is computed once per session and shared by both phases.

use std::path::PathBuf;

use tracing::info;

use crate::config::TunerConfig;
use crate::error::Result;
use crate::io::runner::Simulator;
use crate::mechanics::catenary::{self, MooringGeometry};
use crate::platform::Platform;
use crate::systems::deck::InputDeck;
use crate::systems::sdk::{Hook, Observation, Tuned};
use crate::systems::{fine, rough};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseReport {
    pub line_length: f64,
    pub iterations: usize,
    pub metric: f64,
}

impl<O: Observation> From<&Tuned<O>> for PhaseReport {
    fn from(t: &Tuned<O>) -> Self {
        Self { line_length: t.line_length, iterations: t.iterations, metric: t.observation.metric() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TuningReport {
    pub platform: &'static str,
    pub geometry: MooringGeometry,
    pub initial_length: f64,
    pub rough: PhaseReport,
    pub fine: PhaseReport,
    /// MoorDyn file written for the tuned length.
    pub output: PathBuf,
}

pub struct MooringSession {
    cfg: TunerConfig,
    platform: &'static Platform,
    deck: InputDeck,
}

impl MooringSession {
    pub fn new(cfg: TunerConfig) -> Result<Self> {
        cfg.validate()?;
        let platform = cfg.platform()?;
        let geometry = MooringGeometry::compute(platform, cfg.water_depth)?;
        info!(
            platform = platform.name,
            depth = cfg.water_depth,
            offset = geometry.horizontal_offset,
            "mooring geometry computed"
        );
        let deck = InputDeck::new(&cfg.template_dir, platform, geometry).with_policy(cfg.templates.on_mismatch);
        Ok(Self { cfg, platform, deck })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.cfg
    }

    pub fn platform(&self) -> &'static Platform {
        self.platform
    }

    pub fn geometry(&self) -> &MooringGeometry {
        self.deck.geometry()
    }

    pub fn deck(&self) -> &InputDeck {
        &self.deck
    }

    pub fn initial_line_length(&self) -> Result<f64> {
        Ok(catenary::initial_line_length(&self.platform.line, self.cfg.water_depth)?)
    }

    pub fn tune_rough<S: Simulator + ?Sized>(
        &self,
        sim: &mut S,
        hooks: &mut [Box<dyn Hook>],
    ) -> Result<Tuned<rough::Obs>> {
        rough::RoughTuner::new(&self.deck, self.cfg.work_root())
            .with_step(self.cfg.rough.step)
            .with_max_iters(self.cfg.rough.max_iters)
            .tune(self.initial_line_length()?, sim, hooks)
    }

    pub fn tune_fine<S: Simulator + ?Sized>(
        &self,
        length0: f64,
        sim: &mut S,
        hooks: &mut [Box<dyn Hook>],
    ) -> Result<Tuned<fine::Obs>> {
        fine::FineTuner::new(&self.deck, self.cfg.work_root())
            .with_max_iters(self.cfg.fine.max_iters)
            .with_channel(self.cfg.fine.channel.clone())
            .tune(length0, &self.cfg.baseline_path(self.platform), &self.cfg.output, sim, hooks)
    }

    /// Rough then fine; the fine phase starts from the rough result.
    pub fn run<S: Simulator + ?Sized>(&self, sim: &mut S, hooks: &mut [Box<dyn Hook>]) -> Result<TuningReport> {
        let initial_length = self.initial_line_length()?;
        let rough = self.tune_rough(sim, hooks)?;
        let fine = self.tune_fine(rough.line_length, sim, hooks)?;
        Ok(TuningReport {
            platform: self.platform.name,
            geometry: self.geometry().clone(),
            initial_length,
            rough: PhaseReport::from(&rough),
            fine: PhaseReport::from(&fine),
            output: self.cfg.output.clone(),
        })
    }
}

/// One-call contract: tune `cfg`'s platform with `sim`, no hooks.
pub fn tune<S: Simulator + ?Sized>(cfg: TunerConfig, sim: &mut S) -> Result<TuningReport> {
    MooringSession::new(cfg)?.run(sim, &mut [])
}
