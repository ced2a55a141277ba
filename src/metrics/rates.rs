//! Time-windowed averages and byte-counter rates.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::procfs::NetDevStat;

/// Arithmetic mean of the samples pushed within the last `window`.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    window: Duration,
    samples: VecDeque<(Instant, f64)>,
}

impl RollingAverage {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Appends `value` taken at `now`. Non-finite values are dropped.
    pub fn push(&mut self, now: Instant, value: f64) {
        if value.is_finite() {
            self.samples.push_back((now, value));
        }
        self.prune(now);
    }

    /// Mean of the samples still inside the window at `now`; 0 when empty.
    pub fn average(&mut self, now: Instant) -> f64 {
        self.prune(now);
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|(_, v)| v).sum();
        sum / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some((ts, _)) = self.samples.front() {
            if now.saturating_duration_since(*ts) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Receive and transmit throughput in KB/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetRate {
    pub rx: f64,
    pub tx: f64,
}

/// Turns cumulative interface byte counters into per-second rates.
#[derive(Debug, Default)]
pub struct NetRateTracker {
    previous: Option<(Instant, u64, u64)>,
}

impl NetRateTracker {
    /// Records `stat` as the new baseline and returns the rate since the last one.
    ///
    /// The first reading yields zero. A missing reading yields zero and keeps
    /// the baseline. Counters that went backwards floor at zero.
    pub fn observe(&mut self, now: Instant, stat: Option<&NetDevStat>) -> NetRate {
        let Some(stat) = stat else {
            return NetRate::default();
        };

        let Some((prev_at, prev_rx, prev_tx)) =
            self.previous.replace((now, stat.rx_bytes, stat.tx_bytes))
        else {
            return NetRate::default();
        };

        let elapsed = now.saturating_duration_since(prev_at).as_secs_f64();
        if elapsed <= 0.0 {
            return NetRate::default();
        }

        let rate = |current: u64, previous: u64| {
            let delta = current as f64 - previous as f64;
            (delta / 1024.0 / elapsed).max(0.0)
        };
        NetRate {
            rx: rate(stat.rx_bytes, prev_rx),
            tx: rate(stat.tx_bytes, prev_tx),
        }
    }
}
