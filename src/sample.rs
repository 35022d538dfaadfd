//! The per-group snapshot produced by a collection pass.

use serde::Serialize;

use crate::cgroup::stats::CgroupStats;
use crate::slurm::{JobIdentity, JobOwner};

/// Cumulative CPU time in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    pub user_seconds: f64,
    pub system_seconds: f64,
    pub total_seconds: f64,
}

/// Memory usage in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    /// Usage minus file-backed cache.
    pub rss_bytes: u64,
    /// File-backed cache.
    pub cache_bytes: u64,
    /// Total usage, cache included.
    pub used_bytes: u64,
    /// Usage limit; `u64::MAX` when unlimited.
    pub total_bytes: u64,
    /// OOM events, when `memory.events` is available.
    pub fail_count: Option<u64>,
}

/// Swap usage in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwapUsage {
    pub used_bytes: u64,
    /// Swap limit; `u64::MAX` when unlimited.
    pub total_bytes: u64,
}

/// One accounting group's resource snapshot for a single collection pass.
///
/// When `failed` is set, only `name` is meaningful. Sections that could not be read are `None`,
/// which keeps "unavailable" distinct from a genuine zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    /// Job, step and task ids for job-shaped groups.
    pub job: Option<JobIdentity>,
    /// Effective uid of the job, empty until resolved.
    pub uid: String,
    /// Username of the job, empty until resolved.
    pub username: String,
    pub cpu: Option<CpuUsage>,
    /// Explicit CPU ids assigned through `cpuset.cpus`.
    pub cpus: Option<Vec<String>>,
    pub memory: Option<MemoryUsage>,
    pub swap: Option<SwapUsage>,
    pub failed: bool,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A sample marking `name` as not collectable in this pass.
    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: true,
            ..Default::default()
        }
    }

    /// Fills the CPU, memory and swap sections from raw kernel counters.
    pub fn apply_stats(&mut self, stats: &CgroupStats) {
        self.cpu = stats.cpu.as_ref().map(|cpu| CpuUsage {
            user_seconds: cpu.user_seconds(),
            system_seconds: cpu.system_seconds(),
            total_seconds: cpu.total_seconds(),
        });

        if stats.has_memory() {
            let used_bytes = stats.memory_usage.as_ref().map_or(0, |usage| usage.bytes);
            let cache_bytes = stats.memory_stat.as_ref().map_or(0, |stat| stat.file);
            self.memory = Some(MemoryUsage {
                rss_bytes: used_bytes.saturating_sub(cache_bytes),
                cache_bytes,
                used_bytes,
                total_bytes: stats
                    .memory_limit
                    .as_ref()
                    .map_or(0, |limit| limit.bytes_or_max()),
                fail_count: stats.memory_events.as_ref().map(|events| events.oom),
            });
        }

        if stats.swap_usage.is_some() || stats.swap_limit.is_some() {
            self.swap = Some(SwapUsage {
                used_bytes: stats.swap_usage.as_ref().map_or(0, |usage| usage.bytes),
                total_bytes: stats
                    .swap_limit
                    .as_ref()
                    .map_or(0, |limit| limit.bytes_or_max()),
            });
        }
    }

    pub fn apply_owner(&mut self, owner: &JobOwner) {
        self.uid = owner.uid.to_string();
        self.username = owner.username.clone();
    }

    pub fn job_id(&self) -> &str {
        self.job.as_ref().map_or("", |job| job.job_id.as_str())
    }

    pub fn step(&self) -> &str {
        self.job.as_ref().map_or("", |job| job.step.as_str())
    }

    pub fn task(&self) -> &str {
        self.job.as_ref().map_or("", |job| job.task.as_str())
    }

    /// Whether this is a job-level aggregate group, i.e. a job without step or task.
    pub fn is_job_level(&self) -> bool {
        self.job.as_ref().is_some_and(JobIdentity::is_job_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::stats::{CpuStat, MemoryEvents, MemoryLimit, MemoryStat};

    #[test]
    fn test_failed_sample_carries_only_name() {
        let sample = Sample::failed("/slurm/job_1");
        assert!(sample.failed);
        assert_eq!(sample.name, "/slurm/job_1");
        assert_eq!(sample.cpu, None);
        assert_eq!(sample.memory, None);
        assert_eq!(sample.job_id(), "");
    }

    #[test]
    fn test_apply_stats_converts_units() {
        let stats = CgroupStats {
            cpu: Some(CpuStat {
                usage_usec: 4_000_000,
                user_usec: 3_000_000,
                system_usec: 1_000_000,
            }),
            memory_stat: Some(MemoryStat {
                anon: 600,
                file: 400,
            }),
            memory_usage: Some(crate::cgroup::stats::MemoryUsage { bytes: 1000 }),
            memory_limit: Some(MemoryLimit {
                limit_bytes: Some(2048),
            }),
            swap_usage: Some(crate::cgroup::stats::MemoryUsage { bytes: 16 }),
            swap_limit: Some(MemoryLimit { limit_bytes: None }),
            memory_events: Some(MemoryEvents {
                oom: 2,
                ..Default::default()
            }),
        };

        let mut sample = Sample::new("/slurm/job_1");
        sample.apply_stats(&stats);

        assert_eq!(
            sample.cpu,
            Some(CpuUsage {
                user_seconds: 3.0,
                system_seconds: 1.0,
                total_seconds: 4.0,
            })
        );
        assert_eq!(
            sample.memory,
            Some(MemoryUsage {
                rss_bytes: 600,
                cache_bytes: 400,
                used_bytes: 1000,
                total_bytes: 2048,
                fail_count: Some(2),
            })
        );
        assert_eq!(
            sample.swap,
            Some(SwapUsage {
                used_bytes: 16,
                total_bytes: u64::MAX,
            })
        );
    }

    #[test]
    fn test_apply_stats_without_optional_sections() {
        let stats = CgroupStats {
            memory_usage: Some(crate::cgroup::stats::MemoryUsage { bytes: 10 }),
            ..Default::default()
        };
        let mut sample = Sample::new("/slurm");
        sample.apply_stats(&stats);

        assert_eq!(sample.cpu, None);
        assert_eq!(sample.swap, None);
        let memory = sample.memory.unwrap();
        assert_eq!(memory.used_bytes, 10);
        assert_eq!(memory.rss_bytes, 10);
        assert_eq!(memory.fail_count, None);
    }
}
