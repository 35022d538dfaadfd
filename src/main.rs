/// Entry point for the Slurm cgroup exporter.
///
/// Serves the CPU and memory usage of Slurm jobs, read from the cgroup v2 hierarchy, as
/// OpenMetrics on `/metrics`.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug CGROUP_EXPORTER_PATHS=/system.slice/slurmstepd.scope cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    slurm_cgroup_exporter::run().await
}
