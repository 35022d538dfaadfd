//! Structured errors for cgroup interface file parsing.
//!
//! [`StatParseError`] converts into [`std::io::Error`] with `ErrorKind::InvalidData`, so parsers
//! can keep returning `io::Result` while tests can still get at the typed cause.

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

    #[error("invalid value at line {line}: '{value}': {source}")]
    InvalidValue {
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },
}

impl From<StatParseError> for std::io::Error {
    fn from(err: StatParseError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
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
