use std::sync::LazyLock;

use regex::Regex;

/// Matches the tail of a job-shaped group name: `job_<id>[/step_<step>[/user/task_<task>]]`.
const JOB_REGEX: &str = r"/job_([0-9]+)(?:/step_([^/]+)(?:/user/task_([0-9]+|special))?)?$";

static JOB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(JOB_REGEX).expect("JOB_REGEX is a valid regex"));

/// Job, step and task ids derived from a group name.
///
/// Ids are kept as strings: steps may be named (`batch`, `extern`) and tasks may be `special`.
/// Missing levels are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobIdentity {
    pub job_id: String,
    pub step: String,
    pub task: String,
}

impl JobIdentity {
    /// Extracts the identity of a job-shaped group name, or `None` for any other group.
    ///
    /// ```rust
    /// # use slurm_cgroup_exporter::slurm::JobIdentity;
    /// let name = "/slurmstepd.scope/job_42/step_0/user/task_3";
    /// let id = JobIdentity::from_group_name(name).unwrap();
    /// assert_eq!((id.job_id.as_str(), id.step.as_str(), id.task.as_str()), ("42", "0", "3"));
    /// ```
    pub fn from_group_name(name: &str) -> Option<Self> {
        let captures = JOB_PATTERN.captures(name)?;
        let group = |i: usize| {
            captures
                .get(i)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default()
        };

        Some(Self {
            job_id: group(1),
            step: group(2),
            task: group(3),
        })
    }

    /// `true` for the job-level aggregate group, i.e. neither step nor task is set.
    pub fn is_job_level(&self) -> bool {
        self.step.is_empty() && self.task.is_empty()
    }
}

/// Whether groups under `root` follow the Slurm layout.
pub fn is_job_root(root: &str) -> bool {
    root.contains("slurm")
}

/// Whether a group under a Slurm root is scheduler bookkeeping rather than user workload.
pub fn is_excluded(name: &str) -> bool {
    name.rsplit('/').next() == Some("system") || name.ends_with("/slurm")
}

/// Expands the cgroup membership path of a process into the accounting groups it belongs to.
///
/// Under a Slurm `root`, a path containing a `job_<id>` segment yields the full path and the
/// path truncated at that segment, so the process counts both towards its task and towards the
/// job as a whole. Scheduler-internal groups (see [`is_excluded`]) yield nothing. Any other path
/// yields itself.
pub fn expand_group_names(membership: &str, root: &str) -> Vec<String> {
    if !is_job_root(root) {
        return vec![membership.to_owned()];
    }

    let mut names = vec![membership.to_owned()];
    let segments: Vec<&str> = membership.split('/').collect();
    if let Some(job_idx) = segments.iter().position(|s| s.starts_with("job_")) {
        let job_level = segments[..=job_idx].join("/");
        if job_level != membership {
            names.push(job_level);
        }
    }

    names.retain(|name| {
        let excluded = is_excluded(name);
        if excluded {
            log::debug!("skipping scheduler cgroup `{name}`");
        }
        !excluded
    });
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/system.slice/slurmstepd.scope";

    #[test]
    fn test_task_path_yields_task_and_job_groups() {
        let path = "/system.slice/slurmstepd.scope/job_42/step_0/user/task_3";
        let names = expand_group_names(path, ROOT);
        assert_eq!(
            names,
            vec![
                path.to_owned(),
                "/system.slice/slurmstepd.scope/job_42".to_owned()
            ]
        );

        let task = JobIdentity::from_group_name(&names[0]).unwrap();
        assert_eq!(task.job_id, "42");
        assert_eq!(task.step, "0");
        assert_eq!(task.task, "3");

        let job = JobIdentity::from_group_name(&names[1]).unwrap();
        assert_eq!(job.job_id, "42");
        assert!(job.is_job_level());
    }

    #[test]
    fn test_job_path_yields_single_group() {
        let path = "/system.slice/slurmstepd.scope/job_42";
        assert_eq!(expand_group_names(path, ROOT), vec![path.to_owned()]);

        let id = JobIdentity::from_group_name(path).unwrap();
        assert_eq!(id.job_id, "42");
        assert_eq!(id.step, "");
        assert_eq!(id.task, "");
    }

    #[test]
    fn test_non_job_path_yields_itself() {
        let path = "/system.slice/slurmstepd.scope/other";
        assert_eq!(expand_group_names(path, ROOT), vec![path.to_owned()]);
        assert_eq!(JobIdentity::from_group_name(path), None);
    }

    #[test]
    fn test_non_slurm_root_is_not_expanded() {
        let path = "/user.slice/job_7/step_0";
        assert_eq!(expand_group_names(path, "/user.slice"), vec![path.to_owned()]);
    }

    #[test]
    fn test_named_step_and_special_task() {
        let id =
            JobIdentity::from_group_name("/slurm/job_9/step_extern/user/task_special").unwrap();
        assert_eq!(id.job_id, "9");
        assert_eq!(id.step, "extern");
        assert_eq!(id.task, "special");

        let id = JobIdentity::from_group_name("/slurm/job_9/step_batch").unwrap();
        assert_eq!(id.step, "batch");
        assert_eq!(id.task, "");
    }

    #[test]
    fn test_non_numeric_task_is_not_job_shaped() {
        assert_eq!(
            JobIdentity::from_group_name("/slurm/job_9/step_0/user/task_x"),
            None
        );
    }

    #[test]
    fn test_scheduler_groups_are_excluded() {
        assert!(expand_group_names("/system.slice/slurmstepd.scope/system", ROOT).is_empty());
        assert!(expand_group_names("/system.slice/slurm", "/system.slice/slurm").is_empty());
        assert_eq!(
            expand_group_names("/system.slice/slurm/job_5/step_0", "/system.slice/slurm"),
            vec![
                "/system.slice/slurm/job_5/step_0".to_owned(),
                "/system.slice/slurm/job_5".to_owned()
            ]
        );
    }

    #[test]
    fn test_exclusions_only_apply_to_slurm_roots() {
        assert_eq!(
            expand_group_names("/machine.slice/system", "/machine.slice"),
            vec!["/machine.slice/system".to_owned()]
        );
    }
}
