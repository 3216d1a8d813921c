//! Runs the external simulator and collects its binary output.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("failed to launch {exe}: {source}")]
    Spawn {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{exe} exited with {status} on {input}")]
    ExitStatus { exe: PathBuf, input: PathBuf, status: ExitStatus },

    #[error("{exe} did not finish {input} within {timeout:?} ({attempts} attempt(s))")]
    Timeout {
        exe: PathBuf,
        input: PathBuf,
        timeout: Duration,
        attempts: u32,
    },

    #[error("simulator finished but produced no output at {path}")]
    MissingOutput { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimulatorError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimulatorError::Io { path: path.into(), source }
    }
}

/// What to do when one invocation exceeds its timeout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    #[default]
    Fail,
    Retry { attempts: u32 },
}

/// The seam the tuner drives: one input file in, one binary output file out.
pub trait Simulator {
    fn run(&mut self, input: &Path) -> Result<PathBuf, SimulatorError>;
}

/// Invokes a FAST/OpenFAST executable as `executable <input>`.
#[derive(Clone, Debug)]
pub struct FastRunner {
    executable: PathBuf,
    timeout: Option<Duration>,
    poll: Duration,
    on_timeout: TimeoutPolicy,
    output_extension: String,
    archive_dir: String,
}

impl FastRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
            poll: Duration::from_millis(200),
            on_timeout: TimeoutPolicy::Fail,
            output_extension: "outb".to_string(),
            archive_dir: "outb_files".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.on_timeout = policy;
        self
    }

    pub fn with_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.output_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_archive_dir(mut self, dir: impl Into<String>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Runs every input in order, then moves each input directory's output
    /// files into the archive subdirectory. Returns the archived output path
    /// of each input, in input order.
    pub fn run_all<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<PathBuf>, SimulatorError> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut produced = Vec::with_capacity(inputs.len());
        for input in inputs {
            let input = input.as_ref();
            self.invoke(input)?;
            let output = input.with_extension(&self.output_extension);
            if !output.is_file() {
                return Err(SimulatorError::MissingOutput { path: output });
            }
            let dir = parent_dir(input);
            if !dirs.contains(&dir) {
                dirs.push(dir.clone());
            }
            produced.push(dir.join(&self.archive_dir).join(output.file_name().unwrap_or_default()));
        }
        for dir in &dirs {
            self.relocate(dir)?;
        }
        Ok(produced)
    }

    fn invoke(&self, input: &Path) -> Result<(), SimulatorError> {
        let attempts = match self.on_timeout {
            TimeoutPolicy::Fail => 1,
            TimeoutPolicy::Retry { attempts } => attempts.max(1),
        };
        for attempt in 1..=attempts {
            info!(exe = %self.executable.display(), input = %input.display(), attempt, "running simulator");
            let mut child = self.spawn(input)?;
            match self.wait(&mut child, input)? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(SimulatorError::ExitStatus {
                        exe: self.executable.clone(),
                        input: input.to_path_buf(),
                        status,
                    });
                }
                None => warn!(input = %input.display(), attempt, "simulator timed out"),
            }
        }
        Err(SimulatorError::Timeout {
            exe: self.executable.clone(),
            input: input.to_path_buf(),
            timeout: self.timeout.unwrap_or_default(),
            attempts,
        })
    }

    fn spawn(&self, input: &Path) -> Result<Child, SimulatorError> {
        let dir = parent_dir(input);
        let log_path = input.with_extension("log");
        let log = File::create(&log_path).map_err(|e| SimulatorError::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| SimulatorError::io(&log_path, e))?;
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input.file_name().unwrap_or(input.as_os_str()))
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        cmd.spawn().map_err(|source| SimulatorError::Spawn { exe: self.executable.clone(), source })
    }

    /// `None` when the timeout expired; the child is killed in that case.
    fn wait(&self, child: &mut Child, input: &Path) -> Result<Option<ExitStatus>, SimulatorError> {
        let Some(timeout) = self.timeout else {
            return child.wait().map(Some).map_err(|e| SimulatorError::io(input, e));
        };
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) if started.elapsed() >= timeout => {
                    // fails only when the child exited in the meantime
                    if let Err(error) = child.kill() {
                        debug!(input = %input.display(), %error, "timed-out simulator already exited");
                    }
                    if let Err(error) = child.wait() {
                        warn!(input = %input.display(), %error, "could not reap timed-out simulator");
                    }
                    return Ok(None);
                }
                Ok(None) => sleep(self.poll),
                Err(e) => return Err(SimulatorError::io(input, e)),
            }
        }
    }

    fn relocate(&self, dir: &Path) -> Result<(), SimulatorError> {
        let archive = dir.join(&self.archive_dir);
        fs::create_dir_all(&archive).map_err(|e| SimulatorError::io(&archive, e))?;
        let entries = fs::read_dir(dir).map_err(|e| SimulatorError::io(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| SimulatorError::io(dir, e))?.path();
            let matches = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.output_extension.as_str());
            if !matches {
                continue;
            }
            let Some(name) = path.file_name() else { continue };
            let target = archive.join(name);
            if target.exists() {
                fs::remove_file(&target).map_err(|e| SimulatorError::io(&target, e))?;
            }
            fs::rename(&path, &target).map_err(|e| SimulatorError::io(&path, e))?;
            debug!(from = %path.display(), to = %target.display(), "archived output");
        }
        Ok(())
    }
}

impl Simulator for FastRunner {
    fn run(&mut self, input: &Path) -> Result<PathBuf, SimulatorError> {
        let mut outputs = self.run_all(&[input])?;
        outputs.pop().ok_or_else(|| SimulatorError::MissingOutput { path: input.with_extension(&self.output_extension) })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
