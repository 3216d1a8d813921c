//! File-level collaborators of the tuning loop: text templates, binary
//! output, the simulator process and per-iteration scratch space.

pub mod outb;
pub mod runner;
pub mod template;
pub mod workdir;

pub use outb::{OutbError, OutbFile, TimeSeries, read_channels};
pub use runner::{FastRunner, Simulator, SimulatorError, TimeoutPolicy};
pub use template::{MismatchPolicy, Patch, PatchValue, Template, TemplateError, TemplateFormat};
pub use workdir::WorkDir;
