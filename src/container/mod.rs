//! Container inventory from the container runtime's command-line interface.
//!
//! The runtime is asked for three `|`-delimited listings: running containers,
//! a one-shot stats sample and local images. [`collect_inventory`] never fails;
//! a listing whose command cannot run simply contributes nothing.

use std::process::{Command, Stdio};

use serde::Serialize;

mod error;
pub mod parse;

pub use error::{Error, Result};

/// Identity and resource usage of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub cpu: f64,
    pub memory_mb: f64,
    pub memory_limit_mb: f64,
    pub memory_percent: f64,
    pub net_rx_kb: f64,
    pub net_tx_kb: f64,
    pub block_read_kb: f64,
    pub block_write_kb: f64,
    pub pids: u32,
}

/// A local image. `size` is passed through as printed by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub repository: String,
    pub tag: String,
    pub id: String,
    pub size: String,
}

/// Everything the runtime reported in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    /// `true` if at least one listing command succeeded.
    pub available: bool,
    pub containers: Vec<ContainerSummary>,
    pub images: Vec<ImageSummary>,
}

/// The three listings requested from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    Containers,
    Stats,
    Images,
}

impl Listing {
    /// CLI arguments producing this listing.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            Listing::Containers => &["ps", "--format", "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}"],
            Listing::Stats => &[
                "stats",
                "--no-stream",
                "--format",
                "{{.ID}}|{{.Name}}|{{.CPUPerc}}|{{.MemUsage}}|{{.MemPerc}}|{{.NetIO}}|{{.BlockIO}}|{{.PIDs}}",
            ],
            Listing::Images => &[
                "images",
                "--format",
                "{{.Repository}}|{{.Tag}}|{{.ID}}|{{.Size}}",
            ],
        }
    }
}

/// Source of the raw listings.
pub trait ContainerRuntime: Send {
    /// Returns the raw output of `listing`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the listing could not be produced.
    fn list(&self, listing: Listing) -> Result<String>;
}

/// Runs the runtime binary (`docker` by default) and waits for it.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_line(&self, listing: Listing) -> String {
        format!("{} {}", self.binary, listing.args().join(" "))
    }
}

impl ContainerRuntime for CliRuntime {
    fn list(&self, listing: Listing) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(listing.args())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                command: self.command_line(listing),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::ExitStatus {
                command: self.command_line(listing),
                status: output.status,
            });
        }

        // Names and images may carry arbitrary bytes.
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Queries all three listings and merges them. Never fails.
pub fn collect_inventory(runtime: &dyn ContainerRuntime) -> Inventory {
    let run = |listing: Listing| match runtime.list(listing) {
        Ok(output) => Some(output),
        Err(err) => {
            log::debug!("container listing unavailable: {err}");
            None
        }
    };

    let containers = run(Listing::Containers);
    let stats = run(Listing::Stats);
    let images = run(Listing::Images);

    parse::merge_inventory(containers.as_deref(), stats.as_deref(), images.as_deref())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FakeRuntime(HashMap<Listing, String>);

    impl ContainerRuntime for FakeRuntime {
        fn list(&self, listing: Listing) -> Result<String> {
            self.0
                .get(&listing)
                .cloned()
                .ok_or_else(|| Error::Spawn {
                    command: format!("{listing:?}"),
                    source: std::io::ErrorKind::NotFound.into(),
                })
        }
    }

    #[test]
    fn test_collect_with_failing_runtime() {
        let inventory = collect_inventory(&FakeRuntime(HashMap::new()));
        assert_eq!(inventory, Inventory::default());
    }

    #[test]
    fn test_collect_with_stats_only() {
        let runtime = FakeRuntime(HashMap::from([(
            Listing::Stats,
            "abc123|web|5.00%|512MiB / 1GiB|50.00%|1.2kB / 800B|0B / 0B|3\n".to_string(),
        )]));
        let inventory = collect_inventory(&runtime);
        assert!(inventory.available);
        assert_eq!(inventory.containers.len(), 1);
        assert_eq!(inventory.containers[0].name, "web");
        assert!(inventory.images.is_empty());
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let runtime = CliRuntime::new("/definitely/not/a/container/cli");
        let err = runtime.list(Listing::Images).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.to_string().contains("images --format"));
    }

    #[test]
    fn test_non_utf8_output_is_decoded_lossily() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("fake-cli");
        std::fs::write(&cli, "#!/bin/sh\nprintf 'abc123|caf\\351|nginx:1.27|Up 2 hours\\n'\n").unwrap();
        std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = CliRuntime::new(cli.to_string_lossy()).list(Listing::Containers).unwrap();
        assert_eq!(output, "abc123|caf\u{fffd}|nginx:1.27|Up 2 hours\n");
        let inventory = parse::merge_inventory(Some(output.as_str()), None, None);
        assert_eq!(inventory.containers.len(), 1);
    }

    #[test]
    fn test_summary_wire_names() {
        let value = serde_json::to_value(ContainerSummary::default()).unwrap();
        for key in [
            "id",
            "name",
            "image",
            "status",
            "cpu",
            "memoryMb",
            "memoryLimitMb",
            "memoryPercent",
            "netRxKb",
            "netTxKb",
            "blockReadKb",
            "blockWriteKb",
            "pids",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
