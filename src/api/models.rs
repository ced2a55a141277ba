use serde::Serialize;

use crate::container::ContainerSummary;
use crate::metrics::{ProcessUsage, Snapshot};

/// Body of a successful metrics request: the snapshot, plus the scoped view
/// when a `target` matched anything.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse<'a> {
    #[serde(flatten)]
    pub snapshot: &'a Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoped_metrics: Option<ScopedMetrics<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// Processes and containers whose identity contains the requested target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedMetrics<'a> {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<ProcessScope<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<ContainerScope<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessScope<'a> {
    pub count: usize,
    pub cpu_total: f64,
    pub memory_total_mb: f64,
    pub entries: Vec<&'a ProcessUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerScope<'a> {
    pub count: usize,
    pub cpu_total: f64,
    pub memory_total_mb: f64,
    pub memory_limit_mb: f64,
    pub net_rx_total_kb: f64,
    pub net_tx_total_kb: f64,
    pub block_read_total_kb: f64,
    pub block_write_total_kb: f64,
    pub entries: Vec<&'a ContainerSummary>,
}

/// Case-insensitive substring match. An empty needle matches nothing.
fn matches(haystack: &str, needle_lower: &str) -> bool {
    !needle_lower.is_empty() && haystack.to_lowercase().contains(needle_lower)
}

impl<'a> ProcessScope<'a> {
    fn collect(processes: &'a [ProcessUsage], needle: &str) -> Option<Self> {
        let entries: Vec<&ProcessUsage> = processes
            .iter()
            .filter(|p| matches(&p.name, needle) || matches(&p.command_line, needle))
            .collect();
        if entries.is_empty() {
            return None;
        }
        Some(Self {
            count: entries.len(),
            cpu_total: entries.iter().map(|p| p.cpu).sum(),
            memory_total_mb: entries.iter().map(|p| p.memory_mb).sum(),
            entries,
        })
    }
}

impl<'a> ContainerScope<'a> {
    fn collect(containers: &'a [ContainerSummary], needle: &str) -> Option<Self> {
        let entries: Vec<&ContainerSummary> = containers
            .iter()
            .filter(|c| {
                matches(&c.name, needle) || matches(&c.id, needle) || matches(&c.image, needle)
            })
            .collect();
        if entries.is_empty() {
            return None;
        }
        let sum = |field: fn(&ContainerSummary) -> f64| -> f64 {
            entries.iter().copied().map(field).sum()
        };
        Some(Self {
            count: entries.len(),
            cpu_total: sum(|c| c.cpu),
            memory_total_mb: sum(|c| c.memory_mb),
            memory_limit_mb: sum(|c| c.memory_limit_mb),
            net_rx_total_kb: sum(|c| c.net_rx_kb),
            net_tx_total_kb: sum(|c| c.net_tx_kb),
            block_read_total_kb: sum(|c| c.block_read_kb),
            block_write_total_kb: sum(|c| c.block_write_kb),
            entries,
        })
    }
}

impl<'a> ScopedMetrics<'a> {
    /// Returns `None` when neither processes nor containers match `target`.
    pub fn build(target: &str, snapshot: &'a Snapshot) -> Option<Self> {
        let needle = target.to_lowercase();
        let processes = ProcessScope::collect(&snapshot.applications, &needle);
        let containers = ContainerScope::collect(&snapshot.containers, &needle);
        if processes.is_none() && containers.is_none() {
            return None;
        }
        Some(Self {
            target: target.to_string(),
            processes,
            containers,
        })
    }
}
