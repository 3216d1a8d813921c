// src/systems/sdk.rs

//! # Systems SDK
//!
//! Hook protocol and harness shared by the tuning **systems** (self-contained
//! loops that drive one mooring parameter toward an acceptance band). A system
//! owns the candidate line length `θ` and an observation type `Obs`, and wires
//! its closures into the base refinement loop ([`crate::refine`]).
//!
//! ## What this SDK gives you
//! - [`tune_with_hooks`]: runs `refine` over a line length, reports every
//!   iteration to the hooks and honours cooperative cancellation.
//! - A small **hook** protocol ([`Hook`]) so callers can watch progress or
//!   stop a long run without changing the system (progress bars, recorders,
//!   Ctrl-C flags).
//! - [`finish`]: turns the loop [`Outcome`] into the crate's error taxonomy
//!   (`NonConvergence`, `Cancelled`).
//!
//! ## Your responsibilities (per system)
//! 1) **simulate**: `&θ -> Result<D>`: write inputs, run the simulator.
//! 2) **measure**: `&D -> Result<Obs>`: reduce the output to an observation.
//! 3) **converged**: `(&θ, &Obs) -> bool`: acceptance band, not equality.
//! 4) **update**: `(&θ, &Obs) -> θ'`: the control law, usually from
//!    [`crate::mechanics::control`].
//!
//! Keep measure/converged/update pure; the simulate step is the only one that
//! touches the filesystem. Pure closures make a system testable with a fake
//! simulate step (see `tests/rough.rs`, `tests/fine.rs`).

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::{Error, Outcome, Phase, Result, refine};

/// One tested line length and the scalar it produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Iteration {
    pub phase: Phase,
    /// 1-based.
    pub iteration: usize,
    pub line_length: f64,
    /// Phase-specific scalar: worst seabed margin (rough) or frequency
    /// error (fine).
    pub metric: f64,
}

/// Observations report one scalar for logging and error messages.
pub trait Observation {
    fn metric(&self) -> f64;
}

/// Watches a tuning loop.
pub trait Hook {
    /// (Optional) see every tested length and its metric.
    fn on_observe(&mut self, _it: &Iteration) {}
    /// (Optional) request a stop; checked before the first iteration and
    /// after every observation.
    fn cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag; clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Hook for CancelFlag {
    fn cancelled(&self) -> bool {
        self.is_cancelled()
    }
}

/// Keeps every iteration; clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct Recorder(Rc<RefCell<Vec<Iteration>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn iterations(&self) -> Vec<Iteration> {
        self.0.borrow().clone()
    }
}

impl Hook for Recorder {
    fn on_observe(&mut self, it: &Iteration) {
        self.0.borrow_mut().push(*it);
    }
}

/// A successful phase.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuned<Obs> {
    pub line_length: f64,
    pub observation: Obs,
    pub iterations: usize,
}

/// Generic harness for line-length systems with hooks.
#[allow(clippy::too_many_arguments)]
pub fn tune_with_hooks<D, Obs, Sim, Meas, Conv, Upd>(
    phase: Phase,
    length0: f64,
    hooks: &mut [Box<dyn Hook>],
    max_iters: usize,
    simulate: Sim,
    measure: Meas,
    converged: Conv,
    update: Upd,
) -> Result<Outcome<f64, Obs>>
where
    Obs: Observation,
    Sim: FnMut(&f64) -> Result<D>,
    Meas: FnMut(&D) -> Result<Obs>,
    Conv: Fn(&f64, &Obs) -> bool,
    Upd: FnMut(&f64, &Obs) -> f64,
{
    if hooks.iter().any(|h| h.cancelled()) {
        return Ok(Outcome::Cancelled { theta: length0, metrics: None, iters: 0 });
    }
    let observe = |iteration: usize, length: &f64, obs: &Obs| {
        let it = Iteration { phase, iteration, line_length: *length, metric: obs.metric() };
        debug!(%phase, iteration, line_length = it.line_length, metric = it.metric, "tested line length");
        for h in hooks.iter_mut() {
            h.on_observe(&it);
        }
        if hooks.iter().any(|h| h.cancelled()) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    refine(length0, simulate, measure, converged, update, observe, max_iters)
}

/// Maps a loop outcome onto the crate's error taxonomy.
pub fn finish<Obs: Observation>(phase: Phase, outcome: Outcome<f64, Obs>) -> Result<Tuned<Obs>> {
    match outcome {
        Outcome::Converged { theta, metrics, iters } => {
            Ok(Tuned { line_length: theta, observation: metrics, iterations: iters })
        }
        Outcome::ExceededBudget { theta, metrics, iters } => Err(Error::NonConvergence {
            phase,
            iterations: iters,
            last_length: theta,
            last_metric: metrics.as_ref().map(Observation::metric),
        }),
        Outcome::Cancelled { theta, metrics, iters } => Err(Error::Cancelled {
            phase,
            iterations: iters,
            last_length: theta,
            last_metric: metrics.as_ref().map(Observation::metric),
        }),
    }
}
