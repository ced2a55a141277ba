//! Parsers for the kernel's text interfaces below `/proc`.
//!
//! Everything here is synchronous and allocation-light; the engine calls it on
//! the blocking pool. Parsers return [`std::io::Result`] and wrap malformed input
//! in a [`StatParseError`]. Callers decide whether a failure degrades a metric or
//! skips a row.

use std::path::{Path, PathBuf};

mod cpu;
mod error;
mod host;
mod memory;
mod net;
mod parser;
mod process;
pub mod socket;
mod system;
mod utils;

pub use cpu::{CpuSample, CpuTimes, CpuTracker};
pub use error::StatParseError;
pub use host::{HostFiles, HostFilesBuilder, HostStats};
pub use memory::{MemInfo, used_percent};
pub use net::NetDevStat;
pub use parser::{KeyValueStat, SingleLineStat};
pub use process::{ProcStat, ProcStatus, format_cmdline, read_cmdline};
pub use system::{FileHandles, LoadAverage};

/// A procfs mount point, `/proc` on the host or `<rootfs>/proc` in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcRoot {
    base: PathBuf,
}

impl Default for ProcRoot {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn path(&self) -> &Path {
        &self.base
    }

    /// `<base>/<rel>`.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.base.join(rel)
    }

    /// `<base>/<pid>/<file>`.
    pub fn pid_file(&self, pid: u32, file: &str) -> PathBuf {
        self.base.join(pid.to_string()).join(file)
    }

    /// `<base>/net/<table>` for one of the socket tables.
    pub fn socket_table(&self, table: socket::SocketTable) -> PathBuf {
        self.base.join("net").join(table.file_name())
    }

    /// Ids of every numeric entry below the root, in directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the root itself cannot be listed. Unreadable entries
    /// are skipped.
    pub fn pids(&self) -> std::io::Result<Vec<u32>> {
        let pids = std::fs::read_dir(&self.base)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .collect();
        Ok(pids)
    }
}
