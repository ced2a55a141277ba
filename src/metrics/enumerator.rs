use std::collections::HashMap;
use std::net::IpAddr;

use super::model::ProcessUsage;
use crate::fsutil::read_file_with;
use crate::procfs::socket::{self, IpVersion, SocketTable};
use crate::procfs::{KeyValueStat, ProcRoot, ProcStat, ProcStatus, SingleLineStat, read_cmdline};

/// Counts and ranked usage of every process seen in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessCensus {
    pub processes: u32,
    pub threads: u32,
    pub usage: Vec<ProcessUsage>,
}

/// Walks `/proc/<pid>` and attributes CPU time between cycles.
#[derive(Debug, Default)]
pub struct ProcessEnumerator {
    previous_ticks: HashMap<u32, u64>,
}

fn saturating_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

impl ProcessEnumerator {
    /// Enumerates all processes below `root`.
    ///
    /// `cpu_total_diff` is the aggregate tick delta of the current cycle; a
    /// process's CPU share is its own tick delta over it. Processes vanishing
    /// mid-walk are skipped. The tick baseline is replaced by this cycle's.
    pub fn enumerate(&mut self, root: &ProcRoot, cpu_total_diff: u64) -> ProcessCensus {
        let pids = match root.pids() {
            Ok(pids) => pids,
            Err(err) => {
                log::debug!("failed listing {}: {err}", root.path().display());
                return ProcessCensus::default();
            }
        };

        let mut next_ticks = HashMap::with_capacity(pids.len());
        let mut usage = Vec::with_capacity(pids.len());
        let mut processes = 0u64;
        let mut threads = 0u64;

        for pid in pids {
            processes += 1;

            let status = read_file_with(root.pid_file(pid, "status"), ProcStatus::from_reader)
                .inspect_err(|err| log::trace!("pid {pid}: status unavailable: {err}"))
                .unwrap_or_default();
            threads += status.threads;

            let stat = match read_file_with(root.pid_file(pid, "stat"), ProcStat::from_reader) {
                Ok(stat) => stat,
                Err(err) => {
                    log::trace!("pid {pid}: stat unavailable: {err}");
                    continue;
                }
            };

            let ticks = stat.ticks();
            next_ticks.insert(pid, ticks);

            let cpu = match self.previous_ticks.get(&pid) {
                Some(&prev) if ticks >= prev && cpu_total_diff > 0 => {
                    ((ticks - prev) as f64 / cpu_total_diff as f64 * 100.0).clamp(0.0, 100.0)
                }
                _ => 0.0,
            };

            let command_line = read_cmdline(root.pid_file(pid, "cmdline"))
                .ok()
                .filter(|cmd| !cmd.is_empty())
                .unwrap_or_else(|| stat.name.clone());

            usage.push(ProcessUsage {
                pid,
                name: stat.name,
                cpu,
                memory_mb: status.rss_mb(),
                command_line,
            });
        }

        self.previous_ticks = next_ticks;
        usage.sort_by(ProcessUsage::ranking);

        ProcessCensus {
            processes: saturating_u32(processes),
            threads: saturating_u32(threads),
            usage,
        }
    }

    /// Number of pids carried as baseline into the next cycle.
    pub fn tracked(&self) -> usize {
        self.previous_ticks.len()
    }
}

/// Listening sockets across the four socket tables and active TCP connections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionCensus {
    pub listening_tcp: u32,
    pub listening_udp: u32,
    /// Remote peer of every active connection.
    pub active: Vec<(IpVersion, Option<IpAddr>)>,
}

/// Reads `tcp`, `tcp6`, `udp` and `udp6` below `root/net`.
///
/// A missing table contributes nothing; malformed rows are skipped.
pub fn census_connections(root: &ProcRoot) -> ConnectionCensus {
    let mut census = ConnectionCensus::default();

    for table in SocketTable::ALL {
        let path = root.socket_table(table);
        let entries = match read_file_with(&path, |r| socket::parse_table(r, table.version)) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("failed reading {}: {err}", path.display());
                continue;
            }
        };

        let listening_state = table.protocol.listening_state();
        for entry in entries {
            if entry.state == listening_state {
                match table.protocol {
                    socket::Protocol::Tcp => census.listening_tcp += 1,
                    socket::Protocol::Udp => census.listening_udp += 1,
                }
            } else if table.protocol == socket::Protocol::Tcp
                && socket::is_active_state(entry.state)
            {
                census.active.push((table.version, entry.remote));
            }
        }
    }

    census
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn add_process(root: &Path, pid: u32, name: &str, ticks: (u64, u64), rss_kb: u64, threads: u64, cmdline: &[u8]) {
        write(
            root,
            &format!("{pid}/stat"),
            format!("{pid} ({name}) S 1 1 1 0 -1 0 0 0 0 0 {} {} 0 0 20 0 1 0\n", ticks.0, ticks.1).as_bytes(),
        );
        write(
            root,
            &format!("{pid}/status"),
            format!("Name:\t{name}\nVmRSS:\t{rss_kb} kB\nThreads:\t{threads}\n").as_bytes(),
        );
        write(root, &format!("{pid}/cmdline"), cmdline);
    }

    #[test]
    fn test_first_cycle_has_zero_cpu() {
        let dir = tempfile::tempdir().unwrap();
        add_process(dir.path(), 1, "init", (10, 10), 2048, 1, b"/sbin/init\0");
        add_process(dir.path(), 2, "kthreadd", (0, 0), 0, 1, b"");

        let mut enumerator = ProcessEnumerator::default();
        let census = enumerator.enumerate(&ProcRoot::new(dir.path()), 1000);

        assert_eq!(census.processes, 2);
        assert_eq!(census.threads, 2);
        assert!(census.usage.iter().all(|p| p.cpu == 0.0));
        assert_eq!(census.usage[0].pid, 1);
        assert_eq!(census.usage[0].memory_mb, 2.0);
        assert_eq!(census.usage[0].command_line, "/sbin/init");
        assert_eq!(census.usage[1].command_line, "kthreadd");
        assert_eq!(enumerator.tracked(), 2);
    }

    #[test]
    fn test_cpu_share_and_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProcRoot::new(dir.path());
        add_process(dir.path(), 9, "a", (0, 0), 5120, 1, b"a");
        add_process(dir.path(), 3, "b", (0, 0), 5120, 1, b"b");
        add_process(dir.path(), 1, "c", (0, 0), 1024, 1, b"c");

        let mut enumerator = ProcessEnumerator::default();
        enumerator.enumerate(&root, 0);

        add_process(dir.path(), 9, "a", (50, 50), 5120, 1, b"a");
        add_process(dir.path(), 3, "b", (100, 0), 5120, 1, b"b");
        add_process(dir.path(), 1, "c", (150, 50), 1024, 1, b"c");
        let census = enumerator.enumerate(&root, 1000);

        let order: Vec<u32> = census.usage.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![1, 3, 9]);
        assert!((census.usage[0].cpu - 20.0).abs() < 1e-9);
        assert!((census.usage[1].cpu - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_vanished_process_is_dropped_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProcRoot::new(dir.path());
        add_process(dir.path(), 5, "x", (1, 1), 0, 1, b"x");
        add_process(dir.path(), 6, "y", (1, 1), 0, 1, b"y");

        let mut enumerator = ProcessEnumerator::default();
        enumerator.enumerate(&root, 0);
        assert_eq!(enumerator.tracked(), 2);

        std::fs::remove_dir_all(dir.path().join("6")).unwrap();
        let census = enumerator.enumerate(&root, 100);
        assert_eq!(census.processes, 1);
        assert_eq!(enumerator.tracked(), 1);
    }

    #[test]
    fn test_ticks_going_backwards_yield_zero() {
        let dir = tempfile::tempdir().unwrap();
        let root = ProcRoot::new(dir.path());
        add_process(dir.path(), 5, "x", (500, 500), 0, 1, b"x");

        let mut enumerator = ProcessEnumerator::default();
        enumerator.enumerate(&root, 0);
        // pid reused by a younger process
        add_process(dir.path(), 5, "z", (1, 1), 0, 1, b"z");
        let census = enumerator.enumerate(&root, 100);
        assert_eq!(census.usage[0].cpu, 0.0);
    }

    #[test]
    fn test_unreadable_stat_still_counts_process() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "7/status", b"Threads:\t3\n");
        let census = ProcessEnumerator::default().enumerate(&ProcRoot::new(dir.path()), 0);
        assert_eq!(census.processes, 1);
        assert_eq!(census.threads, 3);
        assert!(census.usage.is_empty());
    }

    #[test]
    fn test_non_utf8_process_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "42/stat", b"42 (caf\xe9) S 1 1 1 0 -1 0 0 0 0 0 10 10 0 0 20 0 1 0\n");
        write(dir.path(), "42/status", b"Name:\tcaf\xe9\nVmRSS:\t4096 kB\nThreads:\t3\n");
        write(dir.path(), "42/cmdline", b"");

        let census = ProcessEnumerator::default().enumerate(&ProcRoot::new(dir.path()), 0);
        assert_eq!(census.processes, 1);
        assert_eq!(census.threads, 3);
        assert_eq!(census.usage.len(), 1);
        assert_eq!(census.usage[0].memory_mb, 4.0);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let census = ProcessEnumerator::default().enumerate(&ProcRoot::new("/definitely/not/here"), 0);
        assert_eq!(census, ProcessCensus::default());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_census_connections() {
        let dir = tempfile::tempdir().unwrap();
        let header = "  sl  local_address rem_address   st tx_queue rx_queue\n";
        write(
            dir.path(),
            "net/tcp",
            format!(
                "{header}\
   0: 00000000:0016 00000000:0000 0A 0
   1: 0F02000A:A2B8 22D8B85D:01BB 01 0
   2: 0F02000A:A2BA 22D8B85D:01BB 06 0
   3: 0F02000A:A2BC 22D8B85D:01BB 07 0
"
            )
            .as_bytes(),
        );
        write(
            dir.path(),
            "net/tcp6",
            format!("{header}   0: 00000000000000000000000000000000:0016 00000000000000000000000001000000:0000 0A 0\n")
                .as_bytes(),
        );
        write(
            dir.path(),
            "net/udp",
            format!(
                "{header}\
   0: 00000000:0035 00000000:0000 07 0
   1: broken
   2: 0F02000A:D431 08080808:0035 01 0
"
            )
            .as_bytes(),
        );

        let census = census_connections(&ProcRoot::new(dir.path()));
        assert_eq!(census.listening_tcp, 2);
        assert_eq!(census.listening_udp, 1);
        // the connected udp row is not a connection
        assert_eq!(census.active.len(), 2);
        assert!(census.active.iter().all(|(v, addr)| {
            *v == IpVersion::V4 && *addr == Some(IpAddr::V4(std::net::Ipv4Addr::new(93, 184, 216, 34)))
        }));
    }
}
