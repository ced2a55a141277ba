use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::container::{ContainerSummary, ImageSummary};

/// One complete set of metrics produced by a single collection cycle.
///
/// Percentages lie in `[0, 100]`; rates are KB/s and never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cpu: f64,
    pub cpu_avg: f64,
    pub memory: f64,
    pub swap: f64,
    pub connections: u32,
    pub disk: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub net_rx: f64,
    pub net_tx: f64,
    pub net_rx_avg: f64,
    pub net_tx_avg: f64,
    pub cpu_cores: u32,
    pub processes: u32,
    pub threads: u32,
    pub listening_tcp: u32,
    pub listening_udp: u32,
    pub open_fds: u64,
    pub unique_domains: u32,
    #[serde(rename = "dockerAvailable")]
    pub container_runtime_available: bool,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub applications: Vec<ProcessUsage>,
    pub domains: Vec<DomainUsage>,
    #[serde(rename = "dockerContainers")]
    pub containers: Vec<ContainerSummary>,
    #[serde(rename = "dockerImages")]
    pub images: Vec<ImageSummary>,
}

impl Snapshot {
    /// An all-zero snapshot taken at `timestamp`.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            cpu: 0.0,
            cpu_avg: 0.0,
            memory: 0.0,
            swap: 0.0,
            connections: 0,
            disk: 0.0,
            load1: 0.0,
            load5: 0.0,
            load15: 0.0,
            net_rx: 0.0,
            net_tx: 0.0,
            net_rx_avg: 0.0,
            net_tx_avg: 0.0,
            cpu_cores: 0,
            processes: 0,
            threads: 0,
            listening_tcp: 0,
            listening_udp: 0,
            open_fds: 0,
            unique_domains: 0,
            container_runtime_available: false,
            timestamp,
            applications: Vec::new(),
            domains: Vec::new(),
            containers: Vec::new(),
            images: Vec::new(),
        }
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ`.
fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// CPU and memory usage of one process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    /// Share of the cycle's total CPU delta.
    pub cpu: f64,
    pub memory_mb: f64,
    pub command_line: String,
}

impl ProcessUsage {
    /// CPU descending, then memory descending, then pid ascending.
    pub fn ranking(a: &Self, b: &Self) -> Ordering {
        b.cpu
            .total_cmp(&a.cpu)
            .then_with(|| b.memory_mb.total_cmp(&a.memory_mb))
            .then_with(|| a.pid.cmp(&b.pid))
    }
}

/// Estimated traffic to one remote host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUsage {
    pub domain: String,
    pub receive_rate: f64,
    pub transmit_rate: f64,
    pub connections: u32,
}

impl DomainUsage {
    /// Connections descending, then receive rate descending, then name ascending.
    pub fn ranking(a: &Self, b: &Self) -> Ordering {
        b.connections
            .cmp(&a.connections)
            .then_with(|| b.receive_rate.total_cmp(&a.receive_rate))
            .then_with(|| a.domain.cmp(&b.domain))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn process(pid: u32, cpu: f64, memory_mb: f64) -> ProcessUsage {
        ProcessUsage {
            pid,
            name: format!("p{pid}"),
            cpu,
            memory_mb,
            command_line: String::new(),
        }
    }

    #[test]
    fn test_process_ranking() {
        let mut list = vec![process(9, 10.0, 5.0), process(3, 10.0, 5.0), process(1, 20.0, 1.0)];
        list.sort_by(ProcessUsage::ranking);
        let order: Vec<u32> = list.iter().map(|p| p.pid).collect();
        assert_eq!(order, vec![1, 3, 9]);
    }

    #[test]
    fn test_domain_ranking() {
        let domain = |name: &str, rx: f64, connections: u32| DomainUsage {
            domain: name.to_string(),
            receive_rate: rx,
            transmit_rate: 0.0,
            connections,
        };
        let mut list = vec![
            domain("b.example", 1.0, 2),
            domain("a.example", 1.0, 2),
            domain("c.example", 5.0, 2),
            domain("d.example", 9.0, 1),
        ];
        list.sort_by(DomainUsage::ranking);
        let order: Vec<&str> = list.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(order, vec!["c.example", "a.example", "b.example", "d.example"]);
    }

    #[test]
    fn test_snapshot_wire_names() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        let mut snapshot = Snapshot::empty(ts);
        snapshot.applications.push(process(1, 1.0, 2.0));
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["timestamp"], "2024-05-01T12:30:05Z");
        for key in [
            "cpu",
            "cpuAvg",
            "memory",
            "swap",
            "connections",
            "disk",
            "load1",
            "load5",
            "load15",
            "netRx",
            "netTx",
            "netRxAvg",
            "netTxAvg",
            "cpuCores",
            "processes",
            "threads",
            "listeningTcp",
            "listeningUdp",
            "openFds",
            "uniqueDomains",
            "dockerAvailable",
            "applications",
            "domains",
            "dockerContainers",
            "dockerImages",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["applications"][0]["memoryMb"], 2.0);
        assert!(value["applications"][0].get("commandLine").is_some());
    }
}
