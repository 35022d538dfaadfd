//! Generic readers for the two shapes of cgroup v2 interface files this exporter consumes.
//!
//! - [`KeyValueStat`]: flat `key value` files with one pair per line, such as `cpu.stat`,
//!   `memory.stat` and `memory.events`.
//! - [`SingleLineStat`]: files holding exactly one value, such as `memory.current` or
//!   `memory.swap.max`.
//!
//! # Example: Implementing `KeyValueStat`
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::LazyLock;
//! use slurm_cgroup_exporter::cgroup::stats::KeyValueStat;
//!
//! #[derive(Default)]
//! struct PidsEvents {
//!     max: u64,
//! }
//!
//! fn set_max(stat: &mut PidsEvents, max: u64) {
//!     stat.max = max;
//! }
//!
//! static HANDLERS: LazyLock<HashMap<&'static str, fn(&mut PidsEvents, u64)>> =
//!     LazyLock::new(|| {
//!         let mut map: HashMap<&'static str, fn(&mut PidsEvents, u64)> = HashMap::new();
//!         map.insert("max", set_max);
//!         map
//!     });
//!
//! impl KeyValueStat for PidsEvents {
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
//!         &HANDLERS
//!     }
//! }
//!
//! let events = PidsEvents::from_reader(&mut "max 3\n".as_bytes()).unwrap();
//! assert_eq!(events.max, 3);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use super::StatParseError;

/// A flat, whitespace separated `key value` file.
///
/// Implementors name the keys they care about through [`KeyValueStat::field_handlers`]; every
/// other key is passed to [`KeyValueStat::on_unknown_key`] and ignored by default.
pub trait KeyValueStat: Default
where
    Self: 'static,
{
    /// If `false`, a key seen twice is reported as [`StatParseError::DuplicateField`].
    const ALLOW_DUPLICATE_KEYS: bool;

    /// Known keys and the setter applying a parsed value to `Self`.
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)>;

    /// Parses the whole reader into `Self`.
    ///
    /// Parsing stops early once every known key has been seen and duplicates are not allowed.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if reading fails, or a [`StatParseError`] wrapped as
    /// `ErrorKind::InvalidData` if a known key carries a malformed value.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let mut seen_keys = HashSet::with_capacity(handlers.len());

        let mut line = String::new();
        let mut lineno = 0;
        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace();
            if let (Some(key), Some(val)) = (parts.next(), parts.next()) {
                Self::parse_and_set(key, val, &mut stat, lineno, handlers, &mut seen_keys)?;
            }
            if !Self::ALLOW_DUPLICATE_KEYS && seen_keys.len() == handlers.len() {
                break;
            }
            line.clear();
        }

        Ok(stat)
    }

    /// Parses one pair and hands it to the matching setter.
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
        if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(*k) {
            return Err(StatParseError::DuplicateField {
                field: key.to_string(),
                line: lineno,
            }
            .into());
        }
        handler(stat, parsed);
        Ok(())
    }

    /// Called for keys missing from [`KeyValueStat::field_handlers`]. Ignores them by default.
    #[inline]
    fn on_unknown_key(_key: &str, _val: &str, _lineno: usize) -> std::io::Result<()> {
        Ok(())
    }
}

/// A file holding a single value, e.g. `memory.current`.
pub trait SingleLineStat: Sized + Default {
    /// Parses the first line of the reader.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}

/// Parses a limit file value where the literal `max` stands for "no limit".
pub(super) fn parse_limit(value: &str) -> Result<Option<u64>, StatParseError> {
    match value {
        "max" => Ok(None),
        value => value
            .parse::<u64>()
            .map(Some)
            .map_err(|source| StatParseError::InvalidValue {
                value: value.to_string(),
                line: 1,
                source,
            }),
    }
}
