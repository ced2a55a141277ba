use std::path::{Path, PathBuf};

use super::checks::{
    contains_proc_mount, has_container_indicators, is_pid_namespace_isolated,
    matches_container_cgroup,
};
use crate::error::ResultOkLogExt;
use crate::procfs::ProcRoot;

/// Where the agent is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Host,
    /// Docker, Kubernetes, Podman and friends.
    Container,
}

/// Detects whether we run in a container or directly on the host.
///
/// Heuristics, in order:
///
/// 1. `rootfs/proc` exists and PID 1 there lives in another PID namespace.
/// 2. `/proc/self/cgroup` mentions a container runtime.
/// 3. Marker files or the `container` variable exist.
///
/// Failed checks are logged and skipped.
pub fn detect_runtime_environment(rootfs: impl AsRef<Path>) -> RuntimeEnvironment {
    detect_from(Path::new("/"), rootfs.as_ref())
}

fn detect_from(own_root: &Path, rootfs: &Path) -> RuntimeEnvironment {
    let own_proc = own_root.join("proc");

    match contains_proc_mount(rootfs) {
        Ok(true) => match is_pid_namespace_isolated(&own_proc, &rootfs.join("proc")) {
            Ok(true) => return RuntimeEnvironment::Container,
            Ok(false) => {}
            Err(err) => log::warn!("Namespace check failed when detecting runtime environment: {err}"),
        },
        Ok(false) => {}
        Err(err) => log::warn!("Failed to determine presence of /proc in rootfs: {err}"),
    }

    match matches_container_cgroup(&own_proc.join("self/cgroup")) {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("Cgroup analysis failed during runtime detection: {err}"),
    }

    if has_container_indicators(own_root) {
        return RuntimeEnvironment::Container;
    }

    RuntimeEnvironment::Host
}

/// The host view every collector reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub environment: RuntimeEnvironment,
    pub proc_root: ProcRoot,
    /// Filesystem the disk metric describes.
    pub disk_path: PathBuf,
}

impl HostPaths {
    fn local(environment: RuntimeEnvironment) -> Self {
        Self {
            environment,
            proc_root: ProcRoot::default(),
            disk_path: PathBuf::from("/"),
        }
    }
}

/// Picks the procfs and disk paths to monitor.
///
/// Inside a container the host's root filesystem is expected at `rootfs`.
/// Without it the agent falls back to its own view, which only shows the
/// container.
pub fn resolve_host_paths(rootfs: impl AsRef<Path>) -> HostPaths {
    let rootfs = rootfs.as_ref();
    let environment = detect_runtime_environment(rootfs);
    resolve_for(environment, rootfs)
}

fn resolve_for(environment: RuntimeEnvironment, rootfs: &Path) -> HostPaths {
    if environment == RuntimeEnvironment::Host {
        return HostPaths::local(environment);
    }

    if contains_proc_mount(rootfs).ok_log().unwrap_or(false) {
        log::info!("Running in a container, reading host data from `{}`", rootfs.display());
        return HostPaths {
            environment,
            proc_root: ProcRoot::new(rootfs.join("proc")),
            disk_path: rootfs.to_path_buf(),
        };
    }

    log::warn!(
        "Running in a container without the host root mounted at `{}`; metrics describe the container only",
        rootfs.display()
    );
    HostPaths::local(environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_reads_local_proc() {
        let dir = tempfile::tempdir().unwrap();
        let paths = resolve_for(RuntimeEnvironment::Host, dir.path());
        assert_eq!(paths.proc_root, ProcRoot::default());
        assert_eq!(paths.disk_path, PathBuf::from("/"));
    }

    #[test]
    fn test_container_with_rootfs_reads_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("proc")).unwrap();
        let paths = resolve_for(RuntimeEnvironment::Container, dir.path());
        assert_eq!(paths.proc_root, ProcRoot::new(dir.path().join("proc")));
        assert_eq!(paths.disk_path, dir.path());
    }

    #[test]
    fn test_container_without_rootfs_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = resolve_for(RuntimeEnvironment::Container, &dir.path().join("missing"));
        assert_eq!(paths.environment, RuntimeEnvironment::Container);
        assert_eq!(paths.proc_root, ProcRoot::default());
    }

    #[test]
    fn test_detect_from_marker_file() {
        let own = tempfile::tempdir().unwrap();
        let rootfs = tempfile::tempdir().unwrap();
        std::fs::write(own.path().join(".dockerenv"), "").unwrap();
        assert_eq!(
            detect_from(own.path(), rootfs.path()),
            RuntimeEnvironment::Container
        );
    }

    #[test]
    fn test_detect_from_cgroup() {
        let own = tempfile::tempdir().unwrap();
        let rootfs = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(own.path().join("proc/self")).unwrap();
        std::fs::write(own.path().join("proc/self/cgroup"), "0::/kubepods/burstable/pod1\n").unwrap();
        assert_eq!(
            detect_from(own.path(), rootfs.path()),
            RuntimeEnvironment::Container
        );
    }
}
