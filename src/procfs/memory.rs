//! Memory and swap totals from `/proc/meminfo`.
//!
//! Only the four labels needed for utilisation are parsed; all values are in kB.
//!
//! ```rust
//! use host_pulse::procfs::{KeyValueStat, MemInfo};
//!
//! let data = "MemTotal: 1000 kB\nMemFree: 100 kB\nMemAvailable: 250 kB\nSwapTotal: 0 kB\nSwapFree: 0 kB\n";
//! let info = MemInfo::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(info.memory_percent(), 75.0);
//! assert_eq!(info.swap_percent(), 0.0);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use super::parser::KeyValueStat;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemInfo {
    pub mem_total_kb: u64,
    pub mem_available_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemInfo {
    fn set_mem_total(&mut self, v: u64) {
        self.mem_total_kb = v;
    }

    fn set_mem_available(&mut self, v: u64) {
        self.mem_available_kb = v;
    }

    fn set_swap_total(&mut self, v: u64) {
        self.swap_total_kb = v;
    }

    fn set_swap_free(&mut self, v: u64) {
        self.swap_free_kb = v;
    }

    pub fn memory_percent(&self) -> f64 {
        used_percent(self.mem_total_kb as f64, self.mem_available_kb as f64)
    }

    pub fn swap_percent(&self) -> f64 {
        used_percent(self.swap_total_kb as f64, self.swap_free_kb as f64)
    }
}

/// `(total - available) / total * 100`, clamped to `[0, 100]`.
///
/// A zero (or negative, or non-finite) total yields 0.
pub fn used_percent(total: f64, available: f64) -> f64 {
    if !total.is_finite() || !available.is_finite() || total <= 0.0 {
        return 0.0;
    }
    ((total - available) / total * 100.0).clamp(0.0, 100.0)
}

type Setter = fn(&mut MemInfo, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(4);

    m.insert("MemTotal", MemInfo::set_mem_total);
    m.insert("MemAvailable", MemInfo::set_mem_available);
    m.insert("SwapTotal", MemInfo::set_swap_total);
    m.insert("SwapFree", MemInfo::set_swap_free);

    m
});

impl KeyValueStat for MemInfo {
    const SKIP_LINES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let data = "\
MemTotal:       16318412 kB
MemFree:         1023300 kB
MemAvailable:    8159206 kB
Buffers:          712344 kB
Cached:          6401288 kB
SwapCached:            0 kB
SwapTotal:       2097148 kB
SwapFree:        1048574 kB
";
        let info = MemInfo::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(info.mem_total_kb, 16318412);
        assert_eq!(info.mem_available_kb, 8159206);
        assert_eq!(info.swap_total_kb, 2097148);
        assert_eq!(info.swap_free_kb, 1048574);
        assert!((info.memory_percent() - 50.0).abs() < 0.001);
        assert!((info.swap_percent() - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_meminfo_is_zero() {
        let info = MemInfo::from_reader(&mut "".as_bytes()).unwrap();
        assert_eq!(info, MemInfo::default());
        assert_eq!(info.memory_percent(), 0.0);
        assert_eq!(info.swap_percent(), 0.0);
    }

    #[test]
    fn test_used_percent_is_clamped() {
        assert_eq!(used_percent(100.0, 150.0), 0.0);
        assert_eq!(used_percent(100.0, -50.0), 100.0);
        assert_eq!(used_percent(0.0, 0.0), 0.0);
        assert_eq!(used_percent(f64::NAN, 1.0), 0.0);
    }
}
