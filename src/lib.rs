/*!
`moortune`: closed-loop mooring-line tuning around an external FAST/OpenFAST run.

What it does
- Orchestrates feedback refinement of one parameter θ (the unstretched line
  length) around an opaque process: the simulator executable.
- Composes caller-supplied functions
  (`simulate : θ→D`, `measure : D→Π`, `converged : θ×Π→bool`, `update : θ×Π→θ`)
  into a single step, repeated until the stopping predicate holds or the
  iteration budget runs out.
- Ships the concrete pieces the mooring procedure needs: template patching
  ([`io::template`]), `.outb` decoding ([`io::outb`]), simulator invocation
  ([`io::runner`]), catenary geometry and the banded control law
  ([`mechanics`]), the two tuning phases ([`systems`]) and the session that
  chains them ([`sessions`]).

How to use (call surface only)
- Build a [`config::TunerConfig`] (TOML or in code).
- Pick a [`io::runner::Simulator`] (`FastRunner` for the real executable).
- Call [`sessions::mooring::tune`], or drive [`refine`] directly with your
  own closures.

What it does NOT do
- No simulator physics, no buoy-site scraping, no wind-rose binning.
*/

use std::ops::ControlFlow;

pub mod config;
pub mod error;
pub mod io;
pub mod mechanics;
#[cfg(feature = "metocean")]
pub mod metocean;
pub mod platform;
pub mod sessions;
pub mod systems;

pub use error::{Error, Phase, Result};

/// How a refinement loop ended.
///
/// `theta` is always the last *tested* parameter, never an untested update.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<P, M> {
    Converged { theta: P, metrics: M, iters: usize },
    ExceededBudget { theta: P, metrics: Option<M>, iters: usize },
    Cancelled { theta: P, metrics: Option<M>, iters: usize },
}

impl<P, M> Outcome<P, M> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Outcome::Converged { .. })
    }

    pub fn theta(&self) -> &P {
        match self {
            Outcome::Converged { theta, .. }
            | Outcome::ExceededBudget { theta, .. }
            | Outcome::Cancelled { theta, .. } => theta,
        }
    }

    pub fn iters(&self) -> usize {
        match self {
            Outcome::Converged { iters, .. }
            | Outcome::ExceededBudget { iters, .. }
            | Outcome::Cancelled { iters, .. } => *iters,
        }
    }

    pub fn metrics(&self) -> Option<&M> {
        match self {
            Outcome::Converged { metrics, .. } => Some(metrics),
            Outcome::ExceededBudget { metrics, .. } | Outcome::Cancelled { metrics, .. } => {
                metrics.as_ref()
            }
        }
    }
}

/// Bounded refinement: θ_{t+1} = update(θ_t, measure(simulate(θ_t))).
///
/// Each iteration simulates, measures, hands the measurement to `observe`
/// (which may break the loop), then either stops on `converged` or updates θ.
/// At most `max_iters` simulations are run. Errors from `simulate` or
/// `measure` abort the loop immediately.
pub fn refine<P, D, M, E, Sim, Meas, Conv, Upd, Obs>(
    mut theta: P,
    mut simulate: Sim,
    mut measure: Meas,
    converged: Conv,
    mut update: Upd,
    mut observe: Obs,
    max_iters: usize,
) -> std::result::Result<Outcome<P, M>, E>
where
    Sim: FnMut(&P) -> std::result::Result<D, E>,
    Meas: FnMut(&D) -> std::result::Result<M, E>,
    Conv: Fn(&P, &M) -> bool,
    Upd: FnMut(&P, &M) -> P,
    Obs: FnMut(usize, &P, &M) -> ControlFlow<()>,
{
    let mut last: Option<(P, M)> = None;
    for iter in 1..=max_iters {
        let data = simulate(&theta)?;
        let metrics = measure(&data)?;
        if observe(iter, &theta, &metrics).is_break() {
            return Ok(Outcome::Cancelled { theta, metrics: Some(metrics), iters: iter });
        }
        if converged(&theta, &metrics) {
            return Ok(Outcome::Converged { theta, metrics, iters: iter });
        }
        let next = update(&theta, &metrics);
        last = Some((std::mem::replace(&mut theta, next), metrics));
    }
    match last {
        Some((tested, metrics)) => Ok(Outcome::ExceededBudget {
            theta: tested,
            metrics: Some(metrics),
            iters: max_iters,
        }),
        None => Ok(Outcome::ExceededBudget { theta, metrics: None, iters: 0 }),
    }
}
