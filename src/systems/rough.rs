//! Rough sizing: lengthen the line in fixed steps until no anchor node lifts
//! off the seabed during the run (Kim et al., 2014).
//!
//! The length returned is the one whose run satisfied the predicate.

use std::path::PathBuf;

use tracing::info;

use crate::error::{Error, Result};
use crate::io::outb::read_channels;
use crate::io::runner::Simulator;
use crate::io::workdir::WorkDir;
use crate::mechanics::{fixed_step, no_uplift, seabed_margin};
use crate::platform::LINE_COUNT;
use crate::systems::deck::InputDeck;
use crate::systems::sdk::{Hook, Observation, Tuned, finish, tune_with_hooks};
use crate::Phase;

pub const DEFAULT_STEP: f64 = 5.0;

/// Seabed clearance of each line's anchor node over one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Obs {
    /// `min(z) + depth` per line; negative means the node lifted.
    pub margins: [f64; LINE_COUNT],
    pub clear: bool,
}

impl Obs {
    pub fn from_lines<Z: AsRef<[f64]>>(lines: &[Z; LINE_COUNT], water_depth: f64) -> Self {
        Self {
            margins: std::array::from_fn(|i| seabed_margin(lines[i].as_ref(), water_depth)),
            clear: no_uplift(lines, water_depth),
        }
    }
}

impl Observation for Obs {
    /// Worst margin over all lines.
    fn metric(&self) -> f64 {
        self.margins.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Loop core: `run_at(length)` runs one simulation and returns the anchor
/// node `z` samples of every line.
pub fn tune_with<P>(
    length0: f64,
    step: f64,
    water_depth: f64,
    max_iters: usize,
    hooks: &mut [Box<dyn Hook>],
    mut run_at: P,
) -> Result<Tuned<Obs>>
where
    P: FnMut(f64) -> Result<[Vec<f64>; LINE_COUNT]>,
{
    let outcome = tune_with_hooks(
        Phase::Rough,
        length0,
        hooks,
        max_iters,
        |length| run_at(*length),
        |lines| Ok(Obs::from_lines(lines, water_depth)),
        |_, obs| obs.clear,
        |length, _| fixed_step(*length, step),
    )?;
    finish(Phase::Rough, outcome)
}

/// Phase 1 against a real (or stub) simulator.
#[derive(Clone, Debug)]
pub struct RoughTuner<'a> {
    deck: &'a InputDeck,
    work_root: PathBuf,
    step: f64,
    max_iters: usize,
}

impl<'a> RoughTuner<'a> {
    pub fn new(deck: &'a InputDeck, work_root: impl Into<PathBuf>) -> Self {
        Self { deck, work_root: work_root.into(), step: DEFAULT_STEP, max_iters: 200 }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn tune<S: Simulator + ?Sized>(
        &self,
        length0: f64,
        sim: &mut S,
        hooks: &mut [Box<dyn Hook>],
    ) -> Result<Tuned<Obs>> {
        let depth = self.deck.geometry().water_depth;
        info!(length0, step = self.step, depth, "rough tuning started");
        let channels = self.deck.platform().anchor_node_channels();
        let run_at = |length: f64| -> Result<[Vec<f64>; LINE_COUNT]> {
            let work = WorkDir::new_in(&self.work_root, "rough").map_err(|e| Error::io(&self.work_root, e))?;
            let fst = self.deck.write(work.path(), Phase::Rough, length)?;
            let outb = sim.run(&fst)?;
            let series = read_channels(&outb, &channels)?;
            Ok(std::array::from_fn(|i| series.column(i)))
        };
        let tuned = tune_with(length0, self.step, depth, self.max_iters, hooks, run_at)?;
        info!(line_length = tuned.line_length, iterations = tuned.iterations, "rough tuning converged");
        Ok(tuned)
    }
}
