//! Parsing of the cgroup v2 memory controller files.
//!
//! - `memory.stat` → [`MemoryStat`] (only the anonymous and file-backed breakdown is kept).
//! - `memory.current` and `memory.swap.current` → [`MemoryUsage`].
//! - `memory.max` and `memory.swap.max` → [`MemoryLimit`], where `max` means unlimited.
//! - `memory.events` → [`MemoryEvents`].
//!
//! ```rust
//! use slurm_cgroup_exporter::cgroup::stats::{MemoryLimit, MemoryUsage, SingleLineStat};
//!
//! let usage = MemoryUsage::from_reader(&mut "8192\n".as_bytes()).unwrap();
//! assert_eq!(usage.bytes, 8192);
//!
//! let limit = MemoryLimit::from_reader(&mut "max\n".as_bytes()).unwrap();
//! assert_eq!(limit.limit_bytes, None);
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use super::parser::{KeyValueStat, parse_limit};
use super::{SingleLineStat, StatParseError};

/// Memory breakdown from `memory.stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryStat {
    /// Anonymous memory.
    pub anon: u64,
    /// File-backed memory, i.e. page cache.
    pub file: u64,
}

impl MemoryStat {
    fn set_anon(&mut self, v: u64) {
        self.anon = v;
    }

    fn set_file(&mut self, v: u64) {
        self.file = v;
    }
}

static MEMORY_STAT_SETTERS: LazyLock<HashMap<&'static str, fn(&mut MemoryStat, u64)>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, fn(&mut MemoryStat, u64)> = HashMap::with_capacity(2);

        m.insert("anon", MemoryStat::set_anon);
        m.insert("file", MemoryStat::set_file);

        m
    });

impl KeyValueStat for MemoryStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &MEMORY_STAT_SETTERS
    }
}

/// Event counters from `memory.events`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryEvents {
    pub high: u64,
    pub max: u64,
    /// Number of times the OOM killer was invoked for the group.
    pub oom: u64,
    /// Number of processes killed by the OOM killer.
    pub oom_kill: u64,
}

impl MemoryEvents {
    fn set_high(&mut self, v: u64) {
        self.high = v;
    }

    fn set_max(&mut self, v: u64) {
        self.max = v;
    }

    fn set_oom(&mut self, v: u64) {
        self.oom = v;
    }

    fn set_oom_kill(&mut self, v: u64) {
        self.oom_kill = v;
    }
}

static MEMORY_EVENTS_SETTERS: LazyLock<HashMap<&'static str, fn(&mut MemoryEvents, u64)>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, fn(&mut MemoryEvents, u64)> = HashMap::with_capacity(4);

        m.insert("high", MemoryEvents::set_high);
        m.insert("max", MemoryEvents::set_max);
        m.insert("oom", MemoryEvents::set_oom);
        m.insert("oom_kill", MemoryEvents::set_oom_kill);

        m
    });

impl KeyValueStat for MemoryEvents {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &MEMORY_EVENTS_SETTERS
    }
}

/// Current usage in bytes, from `memory.current` or `memory.swap.current`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub bytes: u64,
}

impl SingleLineStat for MemoryUsage {
    /// Parses a single unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `InvalidData` if the line is not a `u64`.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let line = line.trim();
        let bytes = line
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidValue {
                value: line.to_string(),
                line: 1,
                source,
            })?;

        Ok(MemoryUsage { bytes })
    }
}

/// A limit in bytes, from `memory.max` or `memory.swap.max`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryLimit {
    /// `None` when the file reads `max`, i.e. no limit is set.
    pub limit_bytes: Option<u64>,
}

impl MemoryLimit {
    /// The limit with "unlimited" mapped to `u64::MAX`, as the kernel interface documents it.
    pub fn bytes_or_max(&self) -> u64 {
        self.limit_bytes.unwrap_or(u64::MAX)
    }
}

impl SingleLineStat for MemoryLimit {
    /// Parses either `max` or a single unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `InvalidData` for any other content.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let limit_bytes = parse_limit(line.trim())?;

        Ok(MemoryLimit { limit_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::stats::error::extract_stat_parse_error;

    #[test]
    fn test_parse_memory_stat() {
        let data = "\
anon 1000
file 2000
kernel_stack 300
slab 400
";
        let stat = MemoryStat::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(stat.anon, 1000);
        assert_eq!(stat.file, 2000);
    }

    #[test]
    fn test_parse_memory_stat_missing_file() {
        let data = "anon 1000\n";
        let stat = MemoryStat::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(stat.anon, 1000);
        assert_eq!(stat.file, 0);
    }

    #[test]
    fn test_parse_invalid_memory_stat() {
        let data = "\
anon abc
file 2000
";
        let err = MemoryStat::from_reader(&mut data.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidKeyValue {
                key, value, line, ..
            } => {
                assert_eq!(key, "anon");
                assert_eq!(value, "abc");
                assert_eq!(*line, 1);
            }
            _ => panic!("Expected InvalidKeyValue error"),
        }
    }

    #[test]
    fn test_parse_memory_events() {
        let data = "\
low 0
high 2
max 7
oom 3
oom_kill 1
oom_group_kill 0
";
        let events = MemoryEvents::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(
            events,
            MemoryEvents {
                high: 2,
                max: 7,
                oom: 3,
                oom_kill: 1,
            }
        );
    }

    #[test]
    fn test_parse_memory_usage() {
        let usage = MemoryUsage::from_reader(&mut "8192\n".as_bytes()).unwrap();
        assert_eq!(usage.bytes, 8192);
    }

    #[test]
    fn test_parse_empty_memory_usage() {
        let err = MemoryUsage::from_reader(&mut "".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidValue { value, line, .. } => {
                assert_eq!(value, "");
                assert_eq!(*line, 1);
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_parse_memory_limit() {
        let limit = MemoryLimit::from_reader(&mut "max\n".as_bytes()).unwrap();
        assert_eq!(limit.limit_bytes, None);
        assert_eq!(limit.bytes_or_max(), u64::MAX);

        let limit = MemoryLimit::from_reader(&mut "104857600\n".as_bytes()).unwrap();
        assert_eq!(limit.limit_bytes, Some(104_857_600));
        assert_eq!(limit.bytes_or_max(), 104_857_600);
    }

    #[test]
    fn test_invalid_memory_limit() {
        let err = MemoryLimit::from_reader(&mut "abc\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
