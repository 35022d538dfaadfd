//! The collection pass: discovers accounting groups below the configured roots and reads every
//! group concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cgroup::Cgroup;
use crate::config::CollectorConfig;
use crate::error::ResultOkLogExt;
use crate::fetcher::GroupFetcher;
use crate::process::{ProcFs, ProcessInspector, SystemUsers, UserDirectory};
use crate::sample::Sample;
use crate::slurm::expand_group_names;

/// Accounting groups of one root together with their member processes.
///
/// Group names keep the order in which they were first seen; each group lists a process at most
/// once, in discovery order.
#[derive(Debug, Default)]
pub struct GroupMap {
    names: Vec<String>,
    members: HashMap<String, Members>,
}

#[derive(Debug, Default)]
struct Members {
    pids: Vec<u32>,
    seen: HashSet<u32>,
}

impl GroupMap {
    pub fn insert(&mut self, name: String, pid: u32) {
        if !self.members.contains_key(&name) {
            self.names.push(name.clone());
        }
        let members = self.members.entry(name).or_default();
        if members.seen.insert(pid) {
            members.pids.push(pid);
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn pids(&self, name: &str) -> &[u32] {
        self.members
            .get(name)
            .map(|members| members.pids.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn into_groups(mut self) -> Vec<(String, Vec<u32>)> {
        self.names
            .into_iter()
            .map(|name| {
                let pids = self
                    .members
                    .remove(&name)
                    .map(|members| members.pids)
                    .unwrap_or_default();
                (name, pids)
            })
            .collect()
    }
}

/// Runs collection passes over the configured roots.
///
/// A pass never fails as a whole: a root or group that cannot be read is reported as a failed
/// [`Sample`] and the pass continues.
#[derive(Clone)]
pub struct Collector {
    config: Arc<CollectorConfig>,
    procs: Arc<dyn ProcessInspector>,
    fetcher: GroupFetcher,
}

impl Collector {
    /// Creates a collector reading the live system through `config.proc_root` and the system user
    /// database.
    pub fn new(config: CollectorConfig) -> Self {
        let procs = Arc::new(ProcFs::new(&config.proc_root));
        Self::with_inspectors(config, procs, Arc::new(SystemUsers))
    }

    pub fn with_inspectors(
        config: CollectorConfig,
        procs: Arc<dyn ProcessInspector>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let fetcher = GroupFetcher::new(&config.cgroup_root, Arc::clone(&procs), users);
        Self {
            config: Arc::new(config),
            procs,
            fetcher,
        }
    }

    /// Runs one collection pass and returns a sample for every group found.
    ///
    /// Roots are processed one after the other, groups of a root concurrently. Samples of
    /// different groups come back in no particular order.
    pub async fn collect(&self) -> Vec<Sample> {
        let before = std::time::Instant::now();
        let mut samples = Vec::new();
        for root in &self.config.paths {
            samples.extend(self.collect_root(root).await);
        }
        log::debug!(
            "collected {} samples in {} ms",
            samples.len(),
            before.elapsed().as_millis()
        );
        samples
    }

    async fn collect_root(&self, root: &str) -> Vec<Sample> {
        let group = match Cgroup::load(&self.config.cgroup_root, root) {
            Ok(group) => group,
            Err(err) => {
                log::error!("failed to load root cgroup `{root}`: {err}");
                return vec![Sample::failed(root)];
            }
        };
        let pids = match group.procs(true) {
            Ok(pids) => pids,
            Err(err) => {
                log::error!("failed to list processes of root cgroup `{root}`: {err}");
                return vec![Sample::failed(root)];
            }
        };

        let groups = self.discover_groups(root, &pids);
        log::debug!("found {} cgroups under `{root}`", groups.len());
        self.fetch_all(groups).await
    }

    /// Maps every process onto the accounting groups its cgroup membership expands to.
    ///
    /// Processes that exit before their membership is read are skipped.
    pub fn discover_groups(&self, root: &str, pids: &[u32]) -> GroupMap {
        let mut groups = GroupMap::default();
        for &pid in pids {
            let Some(membership) = self
                .procs
                .cgroup_path(pid)
                .ok_log(&format!("unable to read cgroup of pid {pid} below `{root}`"))
            else {
                continue;
            };
            for name in expand_group_names(&membership, root) {
                groups.insert(name, pid);
            }
        }
        groups
    }

    async fn fetch_all(&self, groups: GroupMap) -> Vec<Sample> {
        let samples = Arc::new(Mutex::new(Vec::with_capacity(groups.len())));
        let permits = Arc::new(Semaphore::new(self.config.max_workers));
        let timeout = self.config.worker_timeout;

        let mut workers = JoinSet::new();
        for (name, pids) in groups.into_groups() {
            let samples = Arc::clone(&samples);
            let permits = Arc::clone(&permits);
            let fetcher = self.fetcher.clone();
            workers.spawn(async move {
                // the semaphore is never closed
                let Ok(permit) = permits.acquire_owned().await else {
                    return;
                };
                let group = name.clone();
                let work = tokio::task::spawn_blocking(move || {
                    // released only once the read returns, even if the worker gave up on it
                    let _permit = permit;
                    fetcher.fetch(&group, &pids)
                });
                let sample = match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(sample)) => sample,
                    Ok(Err(err)) => {
                        log::error!("reading cgroup `{name}` failed: {err}");
                        Sample::failed(name)
                    }
                    Err(_) => {
                        log::error!(
                            "reading cgroup `{name}` timed out after {} ms",
                            timeout.as_millis()
                        );
                        Sample::failed(name)
                    }
                };
                samples
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(sample);
            });
        }
        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                log::error!("collection worker failed: {err}");
            }
        }

        let mut samples = samples.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *samples)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}
