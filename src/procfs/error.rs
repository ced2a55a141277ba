//! Structured errors for procfs parsing.
//!
//! [`StatParseError`] converts into [`std::io::Error`] with
//! [`std::io::ErrorKind::InvalidData`] so parsers can share the `io::Result`
//! signature of the readers they consume. Callers in the collection path never
//! propagate these errors further: a failed file degrades to its default value.

use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatParseError {
    #[error("duplicate field '{field}' at line {line}")]
    DuplicateField { field: String, line: usize },

    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid value in column {column}: '{value}': {source}")]
    InvalidColumn {
        column: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid number in column {column}: '{value}'")]
    InvalidNumber { column: usize, value: String },

    #[error("expected line starting with '{label}', found '{found}'")]
    UnexpectedLabel { label: &'static str, found: String },

    #[error("missing column {column}")]
    MissingColumn { column: usize },

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StatParseError> for std::io::Error {
    fn from(err: StatParseError) -> Self {
        match err {
            StatParseError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Parses the whitespace-separated column at `column` of a single-line stat.
pub(super) fn parse_column<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    column: usize,
) -> Result<u64, StatParseError> {
    let value = parts
        .next()
        .ok_or(StatParseError::MissingColumn { column })?;
    value
        .parse::<u64>()
        .map_err(|source| StatParseError::InvalidColumn {
            column,
            value: value.to_string(),
            source,
        })
}

/// Extracts a `StatParseError` from an `std::io::Error` assuming it was wrapped.
///
/// Panics if the inner error is not a `StatParseError`. Intended for use in test assertions only.
#[cfg(test)]
pub(super) fn extract_stat_parse_error(err: &std::io::Error) -> &StatParseError {
    err.get_ref()
        .and_then(|e| e.downcast_ref::<StatParseError>())
        .unwrap()
}
