//! Generic parsing traits for procfs text files.
//!
//! Two shapes cover almost every file the agent reads:
//!
//! - [`KeyValueStat`]: one `Label: value [unit]` pair per line, such as
//!   `/proc/meminfo` or `/proc/<pid>/status`. Implementors register handlers
//!   for the labels they care about; everything else is skipped.
//! - [`SingleLineStat`]: a single line of whitespace-separated columns, such as
//!   `/proc/loadavg`, `/proc/sys/fs/file-nr` or the aggregate `cpu` line of
//!   `/proc/stat`.
//!
//! # Example: Implementing `KeyValueStat`
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::LazyLock;
//! use host_pulse::procfs::KeyValueStat;
//!
//! #[derive(Default)]
//! struct Pages {
//!     dirty: u64,
//! }
//!
//! fn set_dirty(pages: &mut Pages, v: u64) {
//!     pages.dirty = v;
//! }
//!
//! static HANDLERS: LazyLock<HashMap<&'static str, fn(&mut Pages, u64)>> = LazyLock::new(|| {
//!     let mut m: HashMap<&'static str, fn(&mut Pages, u64)> = HashMap::new();
//!     m.insert("Dirty", set_dirty);
//!     m
//! });
//!
//! impl KeyValueStat for Pages {
//!     const SKIP_LINES: usize = 0;
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
//!         &HANDLERS
//!     }
//! }
//!
//! let pages = Pages::from_reader(&mut "Dirty:   42 kB\nWriteback: 0 kB\n".as_bytes()).unwrap();
//! assert_eq!(pages.dirty, 42);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use super::StatParseError;

/// Parses `Label: value` files line by line into a typed struct.
///
/// The label is everything before the first `:` of a line; the value is the
/// first whitespace-separated token after it. Trailing unit tokens (`kB`) are
/// ignored, so callers have to know the unit of each label.
pub trait KeyValueStat: Default
where
    Self: 'static,
{
    /// The number of lines at the start of the file to skip before parsing begins.
    const SKIP_LINES: usize;

    /// If `false`, a repeated known label is an error and parsing stops as soon
    /// as every known label has been seen.
    const ALLOW_DUPLICATE_KEYS: bool;

    /// Map of known labels (without the trailing `:`) to setters.
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)>;

    /// Parses a buffered reader into `Self`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if reading fails, or a wrapped [`StatParseError`]
    /// if a known label carries a non-numeric value or is duplicated.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let field_count = handlers.len();
        let mut seen_keys = HashSet::with_capacity(field_count);

        // Labels are ASCII, but values such as a process name are arbitrary bytes.
        let mut raw = Vec::new();
        let mut lineno = 0;
        for _ in 0..Self::SKIP_LINES {
            buf.read_until(b'\n', &mut raw)?;
            raw.clear();
        }

        while buf.read_until(b'\n', &mut raw)? != 0 {
            lineno += 1;
            let line = String::from_utf8_lossy(&raw);
            if let Some((key, rest)) = line.split_once(':') {
                let value = rest.split_whitespace().next().unwrap_or_default();
                Self::parse_and_set(key.trim(), value, &mut stat, lineno, handlers, &mut seen_keys)?;
            }
            if !Self::ALLOW_DUPLICATE_KEYS && seen_keys.len() == field_count {
                break;
            }

            raw.clear();
        }

        Ok(stat)
    }

    /// Applies a single label/value pair via its handler.
    ///
    /// Unknown labels are handed to [`KeyValueStat::on_unknown_key`].
    fn parse_and_set(
        key: &str,
        val: &str,
        stat: &mut Self,
        lineno: usize,
        handlers: &HashMap<&'static str, fn(&mut Self, u64)>,
        seen_keys: &mut HashSet<&'static str>,
    ) -> std::io::Result<()> {
        let Some((k, handler)) = handlers.get_key_value(key) else {
            return Self::on_unknown_key(key, val, lineno);
        };

        let parsed = val
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidKeyValue {
                key: key.to_string(),
                value: val.to_string(),
                line: lineno,
                source,
            })?;
        if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(k) {
            return Err(StatParseError::DuplicateField {
                field: key.to_string(),
                line: lineno,
            }
            .into());
        }
        handler(stat, parsed);
        Ok(())
    }

    /// Called for labels without a handler. Ignores them by default.
    #[inline]
    fn on_unknown_key(_key: &str, _val: &str, _lineno: usize) -> std::io::Result<()> {
        Ok(())
    }
}

/// A trait for single-line statistics made of whitespace-separated columns.
pub trait SingleLineStat: Sized + Default {
    /// Parses the statistic from the first line of `buf`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if reading fails or the line is malformed.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}
