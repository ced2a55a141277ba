use std::io::BufRead;
use std::path::Path;
use std::{env, fs};

use super::{Error, Result};
use crate::fsutil;

const CONTAINER_CGROUP_MARKERS: [&str; 4] = ["docker", "kubepods", "containerd", "libpod"];

/// Returns true if `rootfs` contains a `proc` directory.
///
/// # Errors
///
/// Returns [`Error::ExistenceCheck`] if the existence check itself fails.
pub fn contains_proc_mount(rootfs: impl AsRef<Path>) -> Result<bool> {
    let path = rootfs.as_ref().join("proc");

    path.try_exists()
        .map_err(|source| Error::ExistenceCheck { path, source })
}

/// Returns true if our PID namespace differs from the one of PID 1 under `host_proc`.
///
/// # Errors
///
/// Returns [`Error::ReadSymlink`] if either namespace link cannot be read.
pub fn is_pid_namespace_isolated(self_proc: &Path, host_proc: &Path) -> Result<bool> {
    let read_ns = |path: &Path| {
        fs::read_link(path).map_err(|source| Error::ReadSymlink {
            path: path.to_path_buf(),
            source,
        })
    };

    let own = read_ns(&self_proc.join("self/ns/pid"))?;
    let host = read_ns(&host_proc.join("1/ns/pid"))?;
    Ok(own != host)
}

/// Returns true if a cgroup membership file names a container runtime or a
/// hex container id of at least 32 characters.
///
/// # Errors
///
/// * [`Error::FileOpen`] if the file cannot be opened.
/// * [`Error::ReadLine`] if a line cannot be read.
pub fn matches_container_cgroup(path: &Path) -> Result<bool> {
    let mut buf = fsutil::open_file_reader(path)?;
    let mut line = String::with_capacity(256);

    while buf.read_line(&mut line).map_err(|source| Error::ReadLine {
        path: path.to_path_buf(),
        source,
    })? != 0
    {
        if CONTAINER_CGROUP_MARKERS.iter().any(|m| line.contains(m)) {
            return Ok(true);
        }

        if line
            .trim_end()
            .split('/')
            .any(|part| part.len() >= 32 && is_non_empty_hex_string(part))
        {
            return Ok(true);
        }

        line.clear();
    }

    Ok(false)
}

/// Returns true if marker files under `root` or the `container` variable exist.
pub fn has_container_indicators(root: &Path) -> bool {
    root.join(".dockerenv").exists()
        || root.join("run/.containerenv").exists()
        || env::var_os("container").is_some()
}

pub fn is_non_empty_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
