//! Read-only access to the Linux unified cgroup (v2) hierarchy.
//!
//! A [`Cgroup`] is addressed by its path relative to the cgroup2 mount point, e.g.
//! `/system.slice/slurmstepd.scope/job_42/step_0`. It exposes the three primitives the collector
//! is built on:
//!
//! - [`Cgroup::load`] resolves a group by path.
//! - [`Cgroup::procs`] lists member process ids, optionally including all descendants.
//! - [`Cgroup::stat`] reads aggregated counters into [`stats::CgroupStats`].
//!
//! # Supported Stats
//!
//! The following interface files are read, if available:
//!
//! - `cpu.stat`
//! - `memory.stat`, `memory.current`, `memory.max` and `memory.events`
//! - `memory.swap.current` and `memory.swap.max`
//! - `cpuset.cpus`
//!
//! Nothing in this module ever writes to the hierarchy.
mod error;
mod group;
pub mod stats;
mod utils;

pub use error::{Error, Result};
pub use group::Cgroup;
