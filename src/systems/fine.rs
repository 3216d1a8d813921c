//! Fine tuning: nudge the line length until the platform's surge decay
//! frequency matches the reference platform's.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::io::outb::read_channels;
use crate::io::runner::Simulator;
use crate::io::workdir::WorkDir;
use crate::mechanics::{band_step, dominant_frequency, length_update};
use crate::systems::deck::InputDeck;
use crate::systems::sdk::{Hook, Observation, Tuned, finish, tune_with_hooks};
use crate::Phase;

pub const DEFAULT_CHANNEL: &str = "PtfmSurge";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obs {
    /// Hz
    pub frequency: f64,
    pub baseline: f64,
}

impl Obs {
    /// `candidate − baseline`.
    pub fn error(&self) -> f64 {
        self.frequency - self.baseline
    }
}

impl Observation for Obs {
    fn metric(&self) -> f64 {
        self.error()
    }
}

/// Loop core: `run_at(length)` runs one simulation and returns the candidate's
/// dominant frequency.
pub fn tune_with<P>(
    length0: f64,
    baseline_frequency: f64,
    max_iters: usize,
    hooks: &mut [Box<dyn Hook>],
    mut run_at: P,
) -> Result<Tuned<Obs>>
where
    P: FnMut(f64) -> Result<f64>,
{
    let outcome = tune_with_hooks(
        Phase::Fine,
        length0,
        hooks,
        max_iters,
        |length| run_at(*length),
        |frequency| Ok(Obs { frequency: *frequency, baseline: baseline_frequency }),
        |_, obs| band_step(obs.error().abs()).is_none(),
        |length, obs| length_update(*length, obs.error()),
    )?;
    finish(Phase::Fine, outcome)
}

/// Dominant frequency of `channel` in a binary output file.
pub fn channel_frequency(path: &Path, channel: &str) -> Result<f64> {
    let series = read_channels(path, &[channel])?;
    Ok(dominant_frequency(series.time(), &series.column(0))?)
}

/// Phase 2 against a real (or stub) simulator.
#[derive(Clone, Debug)]
pub struct FineTuner<'a> {
    deck: &'a InputDeck,
    work_root: PathBuf,
    max_iters: usize,
    channel: String,
}

impl<'a> FineTuner<'a> {
    pub fn new(deck: &'a InputDeck, work_root: impl Into<PathBuf>) -> Self {
        Self { deck, work_root: work_root.into(), max_iters: 100, channel: DEFAULT_CHANNEL.to_string() }
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Tunes from `length0` against the frequency measured in `baseline`,
    /// then writes the MoorDyn file for the converged length to `output`.
    pub fn tune<S: Simulator + ?Sized>(
        &self,
        length0: f64,
        baseline: &Path,
        output: &Path,
        sim: &mut S,
        hooks: &mut [Box<dyn Hook>],
    ) -> Result<Tuned<Obs>> {
        let baseline_frequency = channel_frequency(baseline, &self.channel)?;
        info!(length0, baseline_frequency, channel = %self.channel, "fine tuning started");
        let run_at = |length: f64| -> Result<f64> {
            let work = WorkDir::new_in(&self.work_root, "fine").map_err(|e| Error::io(&self.work_root, e))?;
            let fst = self.deck.write(work.path(), Phase::Fine, length)?;
            let outb = sim.run(&fst)?;
            channel_frequency(&outb, &self.channel)
        };
        let tuned = tune_with(length0, baseline_frequency, self.max_iters, hooks, run_at)?;
        self.deck.write_moordyn(output, tuned.line_length)?;
        info!(
            line_length = tuned.line_length,
            iterations = tuned.iterations,
            output = %output.display(),
            "fine tuning converged"
        );
        Ok(tuned)
    }
}
