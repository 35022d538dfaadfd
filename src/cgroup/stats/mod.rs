//! Typed views of the cgroup v2 interface files read for every accounting group.
//!
//! [`CgroupStats`] is one snapshot of a group's counters. Each section is optional: a controller
//! that is not enabled for the group simply has no interface file, and the corresponding section is
//! `None` rather than zero.

mod cpu;
mod error;
mod memory;
mod parser;

pub use cpu::CpuStat;
pub use error::StatParseError;
pub use memory::{MemoryEvents, MemoryLimit, MemoryStat, MemoryUsage};
pub use parser::{KeyValueStat, SingleLineStat};

/// Aggregated counters of one cgroup, read in a single pass over its interface files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupStats {
    /// `cpu.stat`
    pub cpu: Option<CpuStat>,
    /// `memory.stat`
    pub memory_stat: Option<MemoryStat>,
    /// `memory.current`
    pub memory_usage: Option<MemoryUsage>,
    /// `memory.max`
    pub memory_limit: Option<MemoryLimit>,
    /// `memory.swap.current`
    pub swap_usage: Option<MemoryUsage>,
    /// `memory.swap.max`
    pub swap_limit: Option<MemoryLimit>,
    /// `memory.events`
    pub memory_events: Option<MemoryEvents>,
}

impl CgroupStats {
    /// Whether the memory controller reported anything for this group.
    pub fn has_memory(&self) -> bool {
        self.memory_stat.is_some() || self.memory_usage.is_some()
    }
}
