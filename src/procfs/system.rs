//! Single-line kernel summaries: `/proc/loadavg` and `/proc/sys/fs/file-nr`.

use std::io::BufRead;

use super::error::parse_column;
use super::{SingleLineStat, StatParseError};

/// The 1, 5 and 15 minute load averages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

impl SingleLineStat for LoadAverage {
    /// Parses `0.52 0.58 0.59 2/1024 12345`; only the first three columns are used.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();
        let mut next = |column: usize| -> Result<f64, StatParseError> {
            let value = parts
                .next()
                .ok_or(StatParseError::MissingColumn { column })?;
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
                _ => Err(StatParseError::InvalidNumber {
                    column,
                    value: value.to_string(),
                }),
            }
        };

        Ok(Self {
            one: next(1)?,
            five: next(2)?,
            fifteen: next(3)?,
        })
    }
}

/// System-wide file handle accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileHandles {
    pub allocated: u64,
    pub unused: u64,
    pub max: u64,
}

impl FileHandles {
    /// Handles currently in use.
    pub fn open(&self) -> u64 {
        self.allocated.saturating_sub(self.unused)
    }
}

impl SingleLineStat for FileHandles {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();
        Ok(Self {
            allocated: parse_column(&mut parts, 1)?,
            unused: parse_column(&mut parts, 2)?,
            max: parse_column(&mut parts, 3)?,
        })
    }
}
