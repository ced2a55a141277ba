//! Aggregate CPU tick counters from the first line of `/proc/stat`.
//!
//! The line has the form
//!
//! ```text
//! cpu  user nice system idle iowait irq softirq steal guest guest_nice
//! ```
//!
//! with every value in `USER_HZ` ticks since boot. Older kernels omit the
//! trailing columns; those default to zero. [`CpuTracker`] turns two consecutive
//! readings into a busy percentage.
//!
//! # Example
//!
//! ```rust
//! use host_pulse::procfs::{CpuTimes, CpuTracker, SingleLineStat};
//!
//! let mut tracker = CpuTracker::default();
//! let first = CpuTimes::from_reader(&mut "cpu 100 0 100 800 0 0 0 0\n".as_bytes()).unwrap();
//! assert_eq!(tracker.observe(Some(&first)).usage, 0.0);
//!
//! let second = CpuTimes::from_reader(&mut "cpu 900 0 100 1000 0 0 0 0\n".as_bytes()).unwrap();
//! let sample = tracker.observe(Some(&second));
//! assert_eq!(sample.total_diff, 1000);
//! assert_eq!(sample.usage, 80.0);
//! ```

use std::io::BufRead;

use super::error::parse_column;
use super::{SingleLineStat, StatParseError};

/// Tick counters of the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Ticks spent idle or waiting on I/O.
    pub fn idle_all(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Ticks spent doing anything else.
    pub fn non_idle(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }

    pub fn total(&self) -> u64 {
        self.idle_all() + self.non_idle()
    }
}

impl SingleLineStat for CpuTimes {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("cpu") => {}
            other => {
                return Err(StatParseError::UnexpectedLabel {
                    label: "cpu",
                    found: other.unwrap_or_default().to_string(),
                }
                .into());
            }
        }

        let mut columns = [0u64; 8];
        for (column, slot) in columns.iter_mut().enumerate() {
            *slot = match parse_column(&mut parts, column + 1) {
                Ok(v) => v,
                // kernels before 2.6.11 stop after `irq`/`softirq`
                Err(StatParseError::MissingColumn { column }) if column > 4 => 0,
                Err(err) => return Err(err.into()),
            };
        }
        let [user, nice, system, idle, iowait, irq, softirq, steal] = columns;

        Ok(Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
        })
    }
}

/// Result of one [`CpuTracker::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuSample {
    /// Busy percentage in `[0, 100]`.
    pub usage: f64,
    /// Total tick delta since the previous reading; 0 without a baseline.
    pub total_diff: u64,
}

/// Baseline for turning cumulative tick counters into a busy percentage.
#[derive(Debug, Default)]
pub struct CpuTracker {
    previous: Option<(u64, u64)>,
}

impl CpuTracker {
    /// Records `times` as the new baseline and returns the usage since the
    /// previous baseline.
    ///
    /// The first reading, and any reading where `times` is unavailable, yields
    /// a zero sample. An unavailable reading leaves the baseline untouched.
    pub fn observe(&mut self, times: Option<&CpuTimes>) -> CpuSample {
        let Some(times) = times else {
            return CpuSample::default();
        };
        let total = times.total();
        let idle = times.idle_all();

        let Some((prev_total, prev_idle)) = self.previous.replace((total, idle)) else {
            return CpuSample::default();
        };

        let total_diff = total.saturating_sub(prev_total);
        let idle_diff = idle.saturating_sub(prev_idle);
        if total_diff == 0 {
            return CpuSample::default();
        }

        let usage = (total_diff.saturating_sub(idle_diff)) as f64 / total_diff as f64 * 100.0;
        CpuSample {
            usage: usage.clamp(0.0, 100.0),
            total_diff,
        }
    }
}
