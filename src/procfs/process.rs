//! Per-process files: `/proc/<pid>/stat`, `/proc/<pid>/status` and
//! `/proc/<pid>/cmdline`.

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::LazyLock;

use super::error::parse_column;
use super::{KeyValueStat, SingleLineStat, StatParseError};

/// Fields of `/proc/<pid>/stat` between the closing `)` and `utime`
/// (`state` through `cmajflt`).
const SKIPPED_STAT_FIELDS: usize = 11;

/// Name and cumulative CPU ticks from `/proc/<pid>/stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcStat {
    pub name: String,
    pub utime: u64,
    pub stime: u64,
}

impl ProcStat {
    /// User plus system ticks.
    pub fn ticks(&self) -> u64 {
        self.utime + self.stime
    }

    /// Parses a stat line like `42 (my (odd) proc) S 1 42 ...`.
    ///
    /// The name runs from the first `(` to the last `)`, so names containing
    /// parentheses or whitespace survive.
    ///
    /// # Errors
    ///
    /// Returns a [`StatParseError`] if the delimiters are missing or the tick
    /// columns are absent or non-numeric.
    pub fn parse(line: &str) -> Result<Self, StatParseError> {
        let (Some(open), Some(close)) = (line.find('('), line.rfind(')')) else {
            return Err(StatParseError::UnexpectedLabel {
                label: "(",
                found: line.trim_end().to_string(),
            });
        };
        if close <= open {
            return Err(StatParseError::UnexpectedLabel {
                label: ")",
                found: line.trim_end().to_string(),
            });
        }

        let name = line[open + 1..close].to_string();
        let mut fields = line[close + 1..].split_whitespace().skip(SKIPPED_STAT_FIELDS);
        let utime = parse_column(&mut fields, SKIPPED_STAT_FIELDS + 3)?;
        let stime = parse_column(&mut fields, SKIPPED_STAT_FIELDS + 4)?;

        Ok(Self { name, utime, stime })
    }
}

impl SingleLineStat for ProcStat {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut raw = Vec::new();
        buf.read_until(b'\n', &mut raw)?;
        Ok(Self::parse(&String::from_utf8_lossy(&raw))?)
    }
}

/// Resident set size and thread count from `/proc/<pid>/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcStatus {
    /// `VmRSS` in kB; absent for kernel threads.
    pub rss_kb: u64,
    pub threads: u64,
}

impl ProcStatus {
    fn set_rss(&mut self, v: u64) {
        self.rss_kb = v;
    }

    fn set_threads(&mut self, v: u64) {
        self.threads = v;
    }

    pub fn rss_mb(&self) -> f64 {
        self.rss_kb as f64 / 1024.0
    }
}

type Setter = fn(&mut ProcStatus, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(2);

    m.insert("VmRSS", ProcStatus::set_rss);
    m.insert("Threads", ProcStatus::set_threads);

    m
});

impl KeyValueStat for ProcStatus {
    const SKIP_LINES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

/// Turns a raw NUL-separated command line into a printable string.
///
/// Returns an empty string for kernel threads and zombies.
pub fn format_cmdline(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw).replace('\0', " ");
    text.trim().to_string()
}

/// Reads `/proc/<pid>/cmdline`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_cmdline(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut raw = Vec::new();
    crate::fsutil::read_file_with(path, |reader| reader.read_to_end(&mut raw))?;
    Ok(format_cmdline(&raw))
}
