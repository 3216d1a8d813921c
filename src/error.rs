use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::io::outb::OutbError;
use crate::io::runner::SimulatorError;
use crate::io::template::TemplateError;
use crate::mechanics::catenary::GeometryError;
use crate::mechanics::spectrum::SpectrumError;
#[cfg(feature = "metocean")]
use crate::metocean::MetoceanError;

/// Tuning phase, used to label iterations and failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Rough,
    Fine,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Rough => f.pad("rough"),
            Phase::Fine => f.pad("fine"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("platform `{0}` not recognized; expected one of OC3, OC4")]
    UnknownPlatform(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Simulator(#[from] SimulatorError),

    #[error(transparent)]
    Outb(#[from] OutbError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[cfg(feature = "metocean")]
    #[error(transparent)]
    Metocean(#[from] MetoceanError),

    #[error(
        "{phase} tuning did not converge within {iterations} iterations \
         (last line length {last_length} m, last metric {last_metric:?})"
    )]
    NonConvergence {
        phase: Phase,
        iterations: usize,
        last_length: f64,
        last_metric: Option<f64>,
    },

    #[error(
        "{phase} tuning cancelled after {iterations} iterations \
         (last line length {last_length} m, last metric {last_metric:?})"
    )]
    Cancelled {
        phase: Phase,
        iterations: usize,
        last_length: f64,
        last_metric: Option<f64>,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
