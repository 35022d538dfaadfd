//! Reads one accounting group into a [`Sample`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cgroup::Cgroup;
use crate::cpuset::parse_cpu_list;
use crate::error::ResultOkLogExt;
use crate::process::{ProcessInspector, UserDirectory};
use crate::sample::Sample;
use crate::slurm::{JobIdentity, resolve_job_owner};

/// Turns a group name and its member processes into a [`Sample`].
///
/// Loading the group and reading its counters are the only steps that fail the sample. CPU set
/// and job owner resolution are best effort and leave their fields empty on error.
#[derive(Clone)]
pub struct GroupFetcher {
    cgroup_root: PathBuf,
    procs: Arc<dyn ProcessInspector>,
    users: Arc<dyn UserDirectory>,
}

impl GroupFetcher {
    pub fn new(
        cgroup_root: impl AsRef<Path>,
        procs: Arc<dyn ProcessInspector>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            cgroup_root: cgroup_root.as_ref().to_path_buf(),
            procs,
            users,
        }
    }

    pub fn fetch(&self, name: &str, pids: &[u32]) -> Sample {
        log::debug!("loading cgroup `{name}`");
        let group = match Cgroup::load(&self.cgroup_root, name) {
            Ok(group) => group,
            Err(err) => {
                log::error!("failed to load cgroup `{name}`: {err}");
                return Sample::failed(name);
            }
        };
        let stats = match group.stat() {
            Ok(stats) => stats,
            Err(err) => {
                log::error!("failed to get stats of cgroup `{name}`: {err}");
                return Sample::failed(name);
            }
        };

        let mut sample = Sample::new(name);
        sample.apply_stats(&stats);
        sample.cpus = group
            .cpuset()
            .ok_log(&format!("unable to read cpuset of `{name}`"))
            .flatten()
            .and_then(|cpus| {
                parse_cpu_list(&cpus).ok_log(&format!("unable to parse cpuset of `{name}`"))
            });

        if let Some(job) = JobIdentity::from_group_name(name) {
            if let Some(owner) =
                resolve_job_owner(name, pids, self.procs.as_ref(), self.users.as_ref())
            {
                sample.apply_owner(&owner);
            }
            sample.job = Some(job);
        }

        sample
    }
}

impl std::fmt::Debug for GroupFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupFetcher")
            .field("cgroup_root", &self.cgroup_root)
            .finish_non_exhaustive()
    }
}
