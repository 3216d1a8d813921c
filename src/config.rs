//! TOML tuning configuration.
//!
//! ```toml
//! platform = "OC3"
//! water_depth = 320.0
//! template_dir = "templates"
//! output = "moordyn_tuned.dat"
//!
//! [simulator]
//! executable = "/opt/openfast/bin/openfast"
//! timeout_secs = 3600
//! on_timeout = { retry = { attempts = 2 } }
//!
//! [rough]
//! step = 5.0
//! max_iters = 200
//!
//! [fine]
//! max_iters = 100
//!
//! [templates]
//! on_mismatch = "fail"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::error::Result;
use crate::io::runner::{FastRunner, TimeoutPolicy};
use crate::io::template::MismatchPolicy;
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunerConfig {
    pub platform: String,
    pub water_depth: f64,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Overrides the platform's baseline `.outb`.
    #[serde(default)]
    pub baseline: Option<PathBuf>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Parent of the per-iteration work directories (default: system temp dir).
    #[serde(default)]
    pub work_root: Option<PathBuf>,
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub rough: RoughConfig,
    #[serde(default)]
    pub fine: FineConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    pub executable: PathBuf,
    /// `None` waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RoughConfig {
    pub step: f64,
    pub max_iters: usize,
}

impl Default for RoughConfig {
    fn default() -> Self {
        Self { step: 5.0, max_iters: 200 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FineConfig {
    pub max_iters: usize,
    /// Platform motion channel compared against the baseline.
    pub channel: String,
}

impl Default for FineConfig {
    fn default() -> Self {
        Self { max_iters: 100, channel: "PtfmSurge".to_string() }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TemplateConfig {
    pub on_mismatch: MismatchPolicy,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_output() -> PathBuf {
    PathBuf::from("moordyn_tuned.dat")
}
fn default_timeout_secs() -> Option<u64> {
    Some(6 * 3600)
}
fn default_poll_ms() -> u64 {
    200
}
fn default_output_extension() -> String {
    "outb".to_string()
}
fn default_archive_dir() -> String {
    "outb_files".to_string()
}

impl SimulatorConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout_secs: default_timeout_secs(),
            poll_ms: default_poll_ms(),
            on_timeout: TimeoutPolicy::default(),
            output_extension: default_output_extension(),
            archive_dir: default_archive_dir(),
        }
    }
}

impl TunerConfig {
    pub fn new(platform: impl Into<String>, water_depth: f64, executable: impl Into<PathBuf>) -> Self {
        Self {
            platform: platform.into(),
            water_depth,
            template_dir: default_template_dir(),
            baseline: None,
            output: default_output(),
            work_root: None,
            simulator: SimulatorConfig::new(executable),
            rough: RoughConfig::default(),
            fine: FineConfig::default(),
            templates: TemplateConfig::default(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut cfg: TunerConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            cfg.resolve_relative_to(base);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.template_dir);
        join(&mut self.output);
        if let Some(b) = self.baseline.as_mut() {
            join(b);
        }
        if let Some(w) = self.work_root.as_mut() {
            join(w);
        }
        // bare program names are looked up on PATH
        if self.simulator.executable.components().count() > 1 {
            join(&mut self.simulator.executable);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.water_depth.is_finite() && self.water_depth > 0.0) {
            return Err(ConfigError::Invalid(format!("water_depth must be positive, got {}", self.water_depth)));
        }
        if !(self.rough.step.is_finite() && self.rough.step > 0.0) {
            return Err(ConfigError::Invalid(format!("rough.step must be positive, got {}", self.rough.step)));
        }
        if self.rough.max_iters == 0 || self.fine.max_iters == 0 {
            return Err(ConfigError::Invalid("max_iters must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn platform(&self) -> crate::Result<&'static Platform> {
        Platform::lookup(&self.platform)
    }

    pub fn baseline_path(&self, platform: &Platform) -> PathBuf {
        self.baseline
            .clone()
            .unwrap_or_else(|| self.template_dir.join(platform.templates.baseline_outb))
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn runner(&self) -> FastRunner {
        let sim = &self.simulator;
        FastRunner::new(&sim.executable)
            .with_timeout(sim.timeout_secs.map(Duration::from_secs))
            .with_poll_interval(Duration::from_millis(sim.poll_ms))
            .with_timeout_policy(sim.on_timeout)
            .with_output_extension(sim.output_extension.clone())
            .with_archive_dir(sim.archive_dir.clone())
    }
}
