use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use super::stats::{
    CgroupStats, CpuStat, KeyValueStat, MemoryEvents, MemoryLimit, MemoryStat, MemoryUsage,
    SingleLineStat,
};
use super::utils::read_stat_file;
use super::{Error, Result};
use crate::fsutil;

/// A loaded cgroup of the unified (v2) hierarchy.
///
/// Loading only checks that the group directory exists; every accessor reads the kernel
/// interface files anew.
#[derive(Debug, Clone)]
pub struct Cgroup {
    name: String,
    path: PathBuf,
}

impl Cgroup {
    /// Loads the group `name`, a path such as `/system.slice/slurmstepd.scope/job_42`, relative to
    /// the cgroup2 `mountpoint`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidGroupPath`] if `name` is not absolute.
    /// - [`Error::NotFound`] if the group directory does not exist.
    pub fn load(mountpoint: impl AsRef<Path>, name: &str) -> Result<Self> {
        if !name.starts_with('/') {
            return Err(Error::InvalidGroupPath(name.to_owned()));
        }
        let path = mountpoint.as_ref().join(name.trim_start_matches('/'));
        if !path.is_dir() {
            return Err(Error::NotFound {
                name: name.to_owned(),
                path,
            });
        }

        Ok(Self {
            name: name.to_owned(),
            path,
        })
    }

    /// Lists the process ids of this group, and of every descendant group if `recursive`.
    ///
    /// Descendant groups that disappear while walking the tree are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the `cgroup.procs` file or the directory of this group itself cannot be read.
    pub fn procs(&self, recursive: bool) -> Result<Vec<u32>> {
        let mut pids = read_procs(&self.path)?;
        if !recursive {
            return Ok(pids);
        }

        let mut stack = VecDeque::new();
        stack.push_back(self.path.clone());
        while let Some(dir) = stack.pop_back() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if dir != self.path && err.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("cgroup `{}` vanished while listing processes", dir.display());
                    continue;
                }
                Err(source) => return Err(Error::ReadDir { path: dir, source }),
            };
            for entry in entries.map_while(std::result::Result::ok) {
                if !entry.file_type().is_ok_and(|ft| ft.is_dir()) {
                    continue;
                }
                let child = entry.path();
                match read_procs(&child) {
                    Ok(child_pids) => pids.extend(child_pids),
                    Err(Error::FileOpen(err))
                        if err.source.kind() == std::io::ErrorKind::NotFound =>
                    {
                        log::debug!(
                            "cgroup `{}` vanished while listing processes",
                            child.display()
                        );
                        continue;
                    }
                    Err(err) => return Err(err),
                }
                stack.push_back(child);
            }
        }

        Ok(pids)
    }

    /// Reads the CPU and memory counters of this group.
    ///
    /// Interface files that do not exist leave their section empty.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the group was removed since it was loaded.
    /// - [`Error::Read`] if an existing file cannot be read or parsed.
    pub fn stat(&self) -> Result<CgroupStats> {
        if !self.path.is_dir() {
            return Err(Error::NotFound {
                name: self.name.clone(),
                path: self.path.clone(),
            });
        }

        Ok(CgroupStats {
            cpu: self.read("cpu.stat", CpuStat::from_reader)?,
            memory_stat: self.read("memory.stat", MemoryStat::from_reader)?,
            memory_usage: self.read("memory.current", MemoryUsage::from_reader)?,
            memory_limit: self.read("memory.max", MemoryLimit::from_reader)?,
            swap_usage: self.read("memory.swap.current", MemoryUsage::from_reader)?,
            swap_limit: self.read("memory.swap.max", MemoryLimit::from_reader)?,
            memory_events: self.read("memory.events", MemoryEvents::from_reader)?,
        })
    }

    /// Returns the raw content of `cpuset.cpus`, or `None` if the group has no such file.
    pub fn cpuset(&self) -> Result<Option<String>> {
        let path = self.path.join("cpuset.cpus");
        if !fsutil::file_exists(&path) {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(|content| Some(content.trim_end_matches('\n').to_owned()))
            .map_err(|source| Error::Read { path, source })
    }

    fn read<T>(
        &self,
        file: &str,
        parser: impl FnOnce(&mut std::io::BufReader<std::fs::File>) -> std::io::Result<T>,
    ) -> Result<Option<T>> {
        let path = self.path.join(file);
        read_stat_file(&path, parser).map_err(|source| Error::Read { path, source })
    }
}

fn read_procs(dir: &Path) -> Result<Vec<u32>> {
    let path = dir.join("cgroup.procs");
    let reader = fsutil::open_file_reader(&path)?;
    let mut pids = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        match line.trim().parse::<u32>() {
            Ok(pid) => pids.push(pid),
            Err(_) if line.trim().is_empty() => {}
            Err(err) => log::warn!(
                "ignoring malformed pid `{line}` in `{}`: {err}",
                path.display()
            ),
        }
    }

    Ok(pids)
}
