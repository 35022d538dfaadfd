//! Slurm naming conventions for cgroup v2 hierarchies.
//!
//! Slurm places every job under a `job_<id>` group, each step under `step_<name>` and, with task
//! affinity enabled, each task under `user/task_<n>` (or `user/task_special` for the step daemon's
//! own processes):
//!
//! ```text
//! /system.slice/slurmstepd.scope/job_42/step_0/user/task_3
//! ```
//!
//! [`expand_group_names`] turns a process's membership path into the accounting groups it is
//! counted in, [`JobIdentity`] extracts the ids from a group name, and [`resolve_job_owner`] finds
//! the user a job runs as.
mod owner;
mod path;

pub use owner::{JobOwner, WRAPPER_EXECUTABLES, resolve_job_owner};
pub use path::{JobIdentity, expand_group_names, is_excluded, is_job_root};
