//! Start-up configuration, read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PATHS: &str = "/system.slice/slurmstepd.scope";
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9306";
const DEFAULT_PROC_MAX_EXEC: usize = 100;
const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_WORKERS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{var}`: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings of the collection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Root groups to scan, relative to `cgroup_root`.
    pub paths: Vec<String>,
    /// Mount point of the cgroup v2 hierarchy.
    pub cgroup_root: PathBuf,
    /// Mount point of procfs.
    pub proc_root: PathBuf,
    /// Maximum recorded executable name length. Not used by the collector itself.
    pub proc_max_exec: usize,
    /// Upper bound for reading one group's counters.
    pub worker_timeout: Duration,
    /// Maximum number of groups read concurrently.
    pub max_workers: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            paths: vec![DEFAULT_PATHS.to_owned()],
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            proc_max_exec: DEFAULT_PROC_MAX_EXEC,
            worker_timeout: Duration::from_secs(DEFAULT_WORKER_TIMEOUT_SECS),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Full exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub collector: CollectorConfig,
    pub listen_address: SocketAddr,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CGROUP_EXPORTER_PATHS` | `/system.slice/slurmstepd.scope` |
    /// | `CGROUP_ROOT` | `/sys/fs/cgroup` |
    /// | `PROC_ROOT` | `/proc` |
    /// | `COLLECT_PROC_MAX_EXEC` | `100` |
    /// | `LISTEN_ADDRESS` | `0.0.0.0:9306` |
    /// | `COLLECT_WORKER_TIMEOUT_SECS` | `10` |
    /// | `COLLECT_MAX_WORKERS` | `64` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if a variable is set to something unparsable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = CollectorConfig::default();

        let paths = match lookup("CGROUP_EXPORTER_PATHS") {
            Some(value) => parse_paths(&value)?,
            None => defaults.paths,
        };
        let cgroup_root = lookup("CGROUP_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.cgroup_root);
        let proc_root = lookup("PROC_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.proc_root);
        let proc_max_exec =
            parse_var(&lookup, "COLLECT_PROC_MAX_EXEC")?.unwrap_or(defaults.proc_max_exec);
        let worker_timeout = parse_var::<u64>(&lookup, "COLLECT_WORKER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.worker_timeout);
        let max_workers =
            parse_var(&lookup, "COLLECT_MAX_WORKERS")?.unwrap_or(defaults.max_workers);
        if max_workers == 0 {
            return Err(Error::InvalidValue {
                var: "COLLECT_MAX_WORKERS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        let listen_address: SocketAddr = match parse_var(&lookup, "LISTEN_ADDRESS")? {
            Some(addr) => addr,
            None => DEFAULT_LISTEN_ADDRESS
                .parse()
                .map_err(|err: std::net::AddrParseError| Error::InvalidValue {
                    var: "LISTEN_ADDRESS",
                    value: DEFAULT_LISTEN_ADDRESS.to_owned(),
                    reason: err.to_string(),
                })?,
        };

        Ok(Self {
            collector: CollectorConfig {
                paths,
                cgroup_root,
                proc_root,
                proc_max_exec,
                worker_timeout,
                max_workers,
            },
            listen_address,
        })
    }
}

fn parse_paths(value: &str) -> Result<Vec<String>> {
    let paths: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect();

    if let Some(path) = paths.iter().find(|path| !path.starts_with('/')) {
        return Err(Error::InvalidValue {
            var: "CGROUP_EXPORTER_PATHS",
            value: value.to_owned(),
            reason: format!("`{path}` is not an absolute cgroup path"),
        });
    }
    if paths.is_empty() {
        return Err(Error::InvalidValue {
            var: "CGROUP_EXPORTER_PATHS",
            value: value.to_owned(),
            reason: "no cgroup path given".to_owned(),
        });
    }

    Ok(paths)
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|err| Error::InvalidValue {
                var,
                value: value.clone(),
                reason: err.to_string(),
            })
        })
        .transpose()
}
