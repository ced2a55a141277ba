use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;

use super::disk::disk_usage_percent;
use super::enumerator::{ProcessEnumerator, census_connections};
use super::model::Snapshot;
use super::rates::{NetRateTracker, RollingAverage};
use super::resolver::{DomainResolver, ReverseLookup, SystemLookup, attribute};
use crate::container::{CliRuntime, ContainerRuntime, collect_inventory};
use crate::procfs::{CpuTracker, HostFiles, ProcRoot};

/// Calls closer together than this return the cached snapshot.
pub const MIN_COLLECTION_INTERVAL: Duration = Duration::from_millis(400);
pub const CPU_AVERAGE_WINDOW: Duration = Duration::from_secs(60);
pub const NETWORK_AVERAGE_WINDOW: Duration = Duration::from_secs(30);

/// Produces snapshots and owns every piece of cross-cycle state.
///
/// [`Engine::collect`] holds one lock for its whole duration, so cycles never
/// overlap. Share it behind an [`Arc`].
#[derive(Debug)]
pub struct Engine {
    min_interval: Duration,
    state: Mutex<EngineState>,
}

struct EngineState {
    proc_root: ProcRoot,
    disk_path: PathBuf,
    cpu_count: u32,
    host_files: HostFiles,
    cpu: CpuTracker,
    network: NetRateTracker,
    cpu_avg: RollingAverage,
    rx_avg: RollingAverage,
    tx_avg: RollingAverage,
    processes: ProcessEnumerator,
    resolver: DomainResolver,
    runtime: Box<dyn ContainerRuntime>,
    cache: Option<(Instant, Arc<Snapshot>)>,
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("proc_root", &self.proc_root)
            .field("disk_path", &self.disk_path)
            .field("cpu_count", &self.cpu_count)
            .field("resolver", &self.resolver)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Returns the cached snapshot if it is younger than the minimum interval,
    /// otherwise runs a full collection cycle and caches its result.
    ///
    /// Never fails: unavailable sources degrade to zero values.
    pub fn collect(&self) -> Arc<Snapshot> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some((at, snapshot)) = &state.cache {
            if now.saturating_duration_since(*at) < self.min_interval {
                return Arc::clone(snapshot);
            }
        }

        let snapshot = Arc::new(state.cycle(now));
        state.cache = Some((now, Arc::clone(&snapshot)));
        log::trace!("collect() took {} ms", now.elapsed().as_millis());
        snapshot
    }

    /// Runs [`Engine::collect`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking task panicked or was cancelled.
    pub async fn collect_blocking(
        self: &Arc<Self>,
    ) -> std::result::Result<Arc<Snapshot>, tokio::task::JoinError> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.collect()).await
    }
}

impl EngineState {
    fn cycle(&mut self, now: Instant) -> Snapshot {
        let host = self.host_files.refresh();

        let cpu = self.cpu.observe(host.cpu.as_ref());
        let (memory, swap) = host
            .memory
            .as_ref()
            .map(|m| (m.memory_percent(), m.swap_percent()))
            .unwrap_or_default();
        let disk = disk_usage_percent(&self.disk_path);
        let rate = self.network.observe(now, host.network.as_ref());
        let load = host.load.unwrap_or_default();
        let open_fds = host.file_handles.map(|h| h.open()).unwrap_or(0);

        let census = self.processes.enumerate(&self.proc_root, cpu.total_diff);

        let sockets = census_connections(&self.proc_root);
        let names: Vec<String> = sockets
            .active
            .iter()
            .map(|(version, addr)| self.resolver.resolve(*version, *addr))
            .collect();
        let (connections, domains) = attribute(names, rate);

        self.cpu_avg.push(now, cpu.usage);
        self.rx_avg.push(now, rate.rx);
        self.tx_avg.push(now, rate.tx);

        let inventory = collect_inventory(self.runtime.as_ref());

        Snapshot {
            cpu: cpu.usage,
            cpu_avg: self.cpu_avg.average(now),
            memory,
            swap,
            connections,
            disk,
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
            net_rx: rate.rx,
            net_tx: rate.tx,
            net_rx_avg: self.rx_avg.average(now),
            net_tx_avg: self.tx_avg.average(now),
            cpu_cores: self.cpu_count,
            processes: census.processes,
            threads: census.threads,
            listening_tcp: sockets.listening_tcp,
            listening_udp: sockets.listening_udp,
            open_fds,
            unique_domains: u32::try_from(domains.len()).unwrap_or(u32::MAX),
            container_runtime_available: inventory.available,
            timestamp: Utc::now(),
            applications: census.usage,
            domains,
            containers: inventory.containers,
            images: inventory.images,
        }
    }
}

/// Logical CPUs available to this process; at least 1.
fn detect_cpu_count() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

#[derive(Default)]
pub struct EngineBuilder {
    proc_root: Option<ProcRoot>,
    disk_path: Option<PathBuf>,
    min_interval: Option<Duration>,
    cpu_count: Option<u32>,
    runtime: Option<Box<dyn ContainerRuntime>>,
    lookup: Option<Box<dyn ReverseLookup>>,
}

impl EngineBuilder {
    /// Sets the procfs mount to read from. Defaults to `/proc`.
    pub fn set_proc_root(&mut self, root: ProcRoot) -> &mut Self {
        self.proc_root = Some(root);
        self
    }

    /// Sets the path whose filesystem the disk metric describes. Defaults to `/`.
    pub fn set_disk_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.disk_path = Some(path.into());
        self
    }

    /// Overrides [`MIN_COLLECTION_INTERVAL`].
    pub fn set_min_interval(&mut self, interval: Duration) -> &mut Self {
        self.min_interval = Some(interval);
        self
    }

    /// Overrides the detected logical CPU count.
    pub fn set_cpu_count(&mut self, count: u32) -> &mut Self {
        self.cpu_count = Some(count);
        self
    }

    /// Sets the container runtime. Defaults to the `docker` CLI.
    pub fn set_container_runtime(&mut self, runtime: Box<dyn ContainerRuntime>) -> &mut Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the reverse resolver. Defaults to the system resolver.
    pub fn set_reverse_lookup(&mut self, lookup: Box<dyn ReverseLookup>) -> &mut Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn build(self) -> Engine {
        let proc_root = self.proc_root.unwrap_or_default();
        let host_files = HostFiles::open(proc_root.path());

        let state = EngineState {
            host_files,
            proc_root,
            disk_path: self.disk_path.unwrap_or_else(|| PathBuf::from("/")),
            cpu_count: self.cpu_count.unwrap_or_else(detect_cpu_count),
            cpu: CpuTracker::default(),
            network: NetRateTracker::default(),
            cpu_avg: RollingAverage::new(CPU_AVERAGE_WINDOW),
            rx_avg: RollingAverage::new(NETWORK_AVERAGE_WINDOW),
            tx_avg: RollingAverage::new(NETWORK_AVERAGE_WINDOW),
            processes: ProcessEnumerator::default(),
            resolver: DomainResolver::new(self.lookup.unwrap_or_else(|| Box::new(SystemLookup))),
            runtime: self
                .runtime
                .unwrap_or_else(|| Box::new(CliRuntime::default())),
            cache: None,
        };

        Engine {
            min_interval: self.min_interval.unwrap_or(MIN_COLLECTION_INTERVAL),
            state: Mutex::new(state),
        }
    }
}
