//! Process and user inspection used to map processes onto cgroups and jobs onto owners.
//!
//! The collector only talks to the [`ProcessInspector`] and [`UserDirectory`] traits. [`ProcFs`]
//! implements the former on top of a (possibly relocated) `/proc` mount, [`SystemUsers`] the latter
//! on top of the system passwd database.

use std::path::{Path, PathBuf};

use procfs::process::Process;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("process {0} not found")]
    NotFound(u32),
    #[error("failed to read process {pid}: {source}")]
    Proc {
        pid: u32,
        #[source]
        source: procfs::ProcError,
    },
    #[error("process {0} is not a member of a cgroup v2 hierarchy")]
    MissingUnifiedCgroup(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read access to per-process kernel state.
pub trait ProcessInspector: Send + Sync {
    /// The cgroup v2 membership path of `pid`, relative to the cgroup mount.
    fn cgroup_path(&self, pid: u32) -> Result<String>;

    /// The resolved path of the executable `pid` runs.
    fn executable(&self, pid: u32) -> Result<PathBuf>;

    /// The effective uid of `pid`.
    fn effective_uid(&self, pid: u32) -> Result<u32>;
}

/// Resolution of numeric user ids to account names.
pub trait UserDirectory: Send + Sync {
    fn username(&self, uid: u32) -> Option<String>;
}

/// [`ProcessInspector`] reading a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn process(&self, pid: u32) -> Result<Process> {
        Process::new_with_root(self.root.join(pid.to_string()))
            .map_err(|source| proc_error(pid, source))
    }
}

fn proc_error(pid: u32, source: procfs::ProcError) -> Error {
    match source {
        procfs::ProcError::NotFound(_) => Error::NotFound(pid),
        source => Error::Proc { pid, source },
    }
}

impl ProcessInspector for ProcFs {
    fn cgroup_path(&self, pid: u32) -> Result<String> {
        let cgroups = self
            .process(pid)?
            .cgroups()
            .map_err(|source| proc_error(pid, source))?;
        // the unified hierarchy is the `0::<path>` entry, its controller list parses as `[""]`
        cgroups
            .into_iter()
            .find(|cgroup| {
                cgroup.hierarchy == 0 && cgroup.controllers.iter().all(String::is_empty)
            })
            .map(|cgroup| cgroup.pathname)
            .ok_or(Error::MissingUnifiedCgroup(pid))
    }

    fn executable(&self, pid: u32) -> Result<PathBuf> {
        self.process(pid)?
            .exe()
            .map_err(|source| proc_error(pid, source))
    }

    fn effective_uid(&self, pid: u32) -> Result<u32> {
        let status = self
            .process(pid)?
            .status()
            .map_err(|source| proc_error(pid, source))?;
        Ok(status.euid)
    }
}

/// [`UserDirectory`] backed by the system user database (`getpwuid_r`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemUsers;

impl UserDirectory for SystemUsers {
    fn username(&self, uid: u32) -> Option<String> {
        users::get_user_by_uid(uid).map(|user| user.name().to_string_lossy().into_owned())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    /// In-memory process table: pid → (cgroup path, executable, effective uid).
    #[derive(Debug, Default)]
    pub(crate) struct FakeProcs(pub HashMap<u32, (String, PathBuf, u32)>);

    impl FakeProcs {
        pub(crate) fn with(mut self, pid: u32, cgroup: &str, exe: &str, uid: u32) -> Self {
            self.0.insert(pid, (cgroup.to_owned(), PathBuf::from(exe), uid));
            self
        }
    }

    impl ProcessInspector for FakeProcs {
        fn cgroup_path(&self, pid: u32) -> Result<String> {
            self.0.get(&pid).map(|p| p.0.clone()).ok_or(Error::NotFound(pid))
        }

        fn executable(&self, pid: u32) -> Result<PathBuf> {
            self.0.get(&pid).map(|p| p.1.clone()).ok_or(Error::NotFound(pid))
        }

        fn effective_uid(&self, pid: u32) -> Result<u32> {
            self.0.get(&pid).map(|p| p.2).ok_or(Error::NotFound(pid))
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct FakeUsers(pub HashMap<u32, String>);

    impl FakeUsers {
        pub(crate) fn with(mut self, uid: u32, name: &str) -> Self {
            self.0.insert(uid, name.to_owned());
            self
        }
    }

    impl UserDirectory for FakeUsers {
        fn username(&self, uid: u32) -> Option<String> {
            self.0.get(&uid).cloned()
        }
    }
}
