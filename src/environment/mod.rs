//! Runtime environment detection.
//!
//! Decides whether the agent runs on the host or inside a container, and
//! where the host's procfs and root filesystem are visible from here.
mod checks;
mod detect;
mod error;

pub use detect::{HostPaths, RuntimeEnvironment, detect_runtime_environment, resolve_host_paths};
pub use error::{Error, Result};
