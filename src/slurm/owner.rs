use std::path::Path;

use crate::process::{ProcessInspector, UserDirectory};

/// Executables Slurm runs inside a job's cgroup on behalf of the job rather than as its workload.
pub const WRAPPER_EXECUTABLES: &[&str] = &["sleep", "slurmstepd"];

/// The user a job runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOwner {
    /// Process the identity was read from.
    pub pid: u32,
    /// Effective uid of that process.
    pub uid: u32,
    pub username: String,
}

/// Determines the owner of the job group `group` from its member processes.
///
/// Candidates are examined in order and the first one whose executable is not one of
/// [`WRAPPER_EXECUTABLES`] is picked. If every candidate is a wrapper, the last one examined is
/// used instead. The effective uid of the picked process is then resolved to a username.
///
/// Returns `None` if `pids` is empty or any step fails; failures are logged.
pub fn resolve_job_owner(
    group: &str,
    pids: &[u32],
    procs: &dyn ProcessInspector,
    users: &dyn UserDirectory,
) -> Option<JobOwner> {
    let mut picked = None;
    let mut found_workload = false;
    for &pid in pids {
        let exe = match procs.executable(pid) {
            Ok(exe) => exe,
            Err(err) => {
                log::error!("unable to read executable of pid {pid} in `{group}`: {err}");
                return None;
            }
        };
        picked = Some(pid);
        if !is_wrapper(&exe) {
            found_workload = true;
            break;
        }
    }

    let Some(pid) = picked else {
        log::debug!("no candidate process to resolve the owner of `{group}`");
        return None;
    };
    if !found_workload {
        log::warn!("only wrapper processes in `{group}`, using pid {pid} for its owner");
    }

    let uid = match procs.effective_uid(pid) {
        Ok(uid) => uid,
        Err(err) => {
            log::error!("unable to read status of pid {pid} in `{group}`: {err}");
            return None;
        }
    };
    let Some(username) = users.username(uid) else {
        log::error!("unable to look up uid {uid} of `{group}`");
        return None;
    };

    Some(JobOwner { pid, uid, username })
}

fn is_wrapper(exe: &Path) -> bool {
    exe.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| WRAPPER_EXECUTABLES.contains(&name))
}
