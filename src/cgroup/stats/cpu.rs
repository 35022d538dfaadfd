//! Parsing of the cgroup v2 `cpu.stat` file.
//!
//! Only the cumulative usage counters are kept; throttling and burst counters are ignored.
//!
//! ```rust
//! use slurm_cgroup_exporter::cgroup::stats::{CpuStat, KeyValueStat};
//!
//! let data = "usage_usec 1500000\nuser_usec 1000000\nsystem_usec 500000\nnr_periods 0\n";
//! let stat = CpuStat::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(stat.user_seconds(), 1.0);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use super::KeyValueStat;

const USEC_PER_SEC: f64 = 1_000_000.0;

/// Cumulative CPU time of a cgroup, in microseconds, as reported by `cpu.stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuStat {
    /// Total time (user + system).
    pub usage_usec: u64,
    /// Time spent in user space.
    pub user_usec: u64,
    /// Time spent in the kernel.
    pub system_usec: u64,
}

impl CpuStat {
    fn set_usage_usec(&mut self, usage_usec: u64) {
        self.usage_usec = usage_usec;
    }

    fn set_user_usec(&mut self, user_usec: u64) {
        self.user_usec = user_usec;
    }

    fn set_system_usec(&mut self, system_usec: u64) {
        self.system_usec = system_usec;
    }

    pub fn user_seconds(&self) -> f64 {
        self.user_usec as f64 / USEC_PER_SEC
    }

    pub fn system_seconds(&self) -> f64 {
        self.system_usec as f64 / USEC_PER_SEC
    }

    pub fn total_seconds(&self) -> f64 {
        self.usage_usec as f64 / USEC_PER_SEC
    }
}

type Setter = fn(&mut CpuStat, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(3);

    m.insert("usage_usec", CpuStat::set_usage_usec);
    m.insert("user_usec", CpuStat::set_user_usec);
    m.insert("system_usec", CpuStat::set_system_usec);

    m
});

impl KeyValueStat for CpuStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}
