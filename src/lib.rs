/// Slurm cgroup exporter: reports per-job CPU and memory usage of a cgroup v2 hierarchy.
///
/// Every scrape runs one collection pass: the processes below the configured root cgroups are
/// mapped onto accounting groups (the task and the job they belong to), each group's kernel
/// counters are read, and the job owner is resolved from the job's processes.
pub mod cgroup;
pub mod collector;
pub mod config;
pub mod cpuset;
pub mod error;
pub mod exporter;
pub mod fetcher;
pub mod fsutil;
pub mod process;
pub mod sample;
pub mod slurm;

/// Runs the exporter until the HTTP server stops.
///
/// # Errors
///
/// Fails on invalid configuration (see [`config::Config::from_env`]) or if the listen address
/// cannot be bound.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configuration: {:?}", config);
    if !config.collector.cgroup_root.join("cgroup.controllers").exists() {
        log::warn!(
            "`{}` does not look like a cgroup v2 mount",
            config.collector.cgroup_root.display()
        );
    }

    let collector = collector::Collector::new(config.collector);
    exporter::Exporter::new(collector)
        .listen(config.listen_address)
        .await?;
    Ok(())
}
