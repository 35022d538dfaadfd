//! OpenMetrics exposition of collection passes over HTTP.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::net::ToSocketAddrs;

use crate::collector::Collector;
use crate::sample::Sample;

pub const NAMESPACE: &str = "cgroup";
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

type Labels = Vec<(String, String)>;
type GaugeFamily = Family<Labels, Gauge<f64, AtomicU64>>;

/// Metric families of one scrape, registered under [`NAMESPACE`].
struct Metrics {
    cpu_user: GaugeFamily,
    cpu_system: GaugeFamily,
    cpu_total: GaugeFamily,
    cpus: GaugeFamily,
    cpu_info: GaugeFamily,
    memory_rss: GaugeFamily,
    memory_cache: GaugeFamily,
    memory_used: GaugeFamily,
    memory_total: GaugeFamily,
    memory_fail_count: GaugeFamily,
    memsw_used: GaugeFamily,
    memsw_total: GaugeFamily,
    uid: GaugeFamily,
    info: GaugeFamily,
    collect_error: GaugeFamily,
}

impl Metrics {
    fn register(registry: &mut Registry) -> Self {
        let mut gauge = |name: &str, help: &str| {
            let family = GaugeFamily::default();
            registry.register(name, help, family.clone());
            family
        };

        Self {
            cpu_user: gauge("cpu_user_seconds", "Cumulative CPU user seconds for cgroup"),
            cpu_system: gauge("cpu_system_seconds", "Cumulative CPU system seconds for cgroup"),
            cpu_total: gauge("cpu_total_seconds", "Cumulative CPU total seconds for cgroup"),
            cpus: gauge("cpus", "Number of CPUs in the cgroup"),
            cpu_info: gauge("cpu_info", "Information about the cgroup CPUs"),
            memory_rss: gauge("memory_rss_bytes", "Memory RSS used in bytes"),
            memory_cache: gauge("memory_cache_bytes", "Memory cache used in bytes"),
            memory_used: gauge("memory_used_bytes", "Memory used in bytes"),
            memory_total: gauge("memory_total_bytes", "Memory total given to cgroup in bytes"),
            memory_fail_count: gauge("memory_fail_count", "Memory fail count"),
            memsw_used: gauge("memsw_used_bytes", "Swap used in bytes"),
            memsw_total: gauge("memsw_total_bytes", "Swap total given to cgroup in bytes"),
            uid: gauge("uid", "Uid number of user running this job"),
            info: gauge("info", "User slice information"),
            collect_error: gauge(
                "exporter_collect_error",
                "Indicates collection error, 0=no error, 1=error",
            ),
        }
    }

    fn record(&self, sample: &Sample) {
        let set = |family: &GaugeFamily, labels: Labels, value: f64| {
            family.get_or_create(&labels).set(value);
        };

        set(
            &self.collect_error,
            labels(&[("cgroup", sample.name.as_str())]),
            if sample.failed { 1.0 } else { 0.0 },
        );
        if sample.failed {
            return;
        }

        let group = labels(&[
            ("cgroup", sample.name.as_str()),
            ("jobid", sample.job_id()),
            ("step", sample.step()),
            ("task", sample.task()),
        ]);

        if let Some(cpu) = &sample.cpu {
            set(&self.cpu_user, group.clone(), cpu.user_seconds);
            set(&self.cpu_system, group.clone(), cpu.system_seconds);
            set(&self.cpu_total, group.clone(), cpu.total_seconds);
        }
        if let Some(cpus) = &sample.cpus {
            set(&self.cpus, group.clone(), cpus.len() as f64);
            if !cpus.is_empty() {
                let list = cpus.join(",");
                let info = labels(&[
                    ("cgroup", sample.name.as_str()),
                    ("cpus", list.as_str()),
                    ("jobid", sample.job_id()),
                ]);
                set(&self.cpu_info, info, 1.0);
            }
        }
        if let Some(memory) = &sample.memory {
            set(&self.memory_rss, group.clone(), memory.rss_bytes as f64);
            set(&self.memory_cache, group.clone(), memory.cache_bytes as f64);
            set(&self.memory_used, group.clone(), memory.used_bytes as f64);
            set(&self.memory_total, group.clone(), memory.total_bytes as f64);
            if let Some(fail_count) = memory.fail_count {
                set(&self.memory_fail_count, group.clone(), fail_count as f64);
            }
        }
        if let Some(swap) = &sample.swap {
            set(&self.memsw_used, group.clone(), swap.used_bytes as f64);
            set(&self.memsw_total, group, swap.total_bytes as f64);
        }

        if sample.is_job_level() {
            if let Ok(uid) = sample.uid.parse::<u32>() {
                let owner = labels(&[
                    ("jobid", sample.job_id()),
                    ("username", sample.username.as_str()),
                ]);
                set(&self.uid, owner, f64::from(uid));
            }
            let info = labels(&[
                ("cgroup", sample.name.as_str()),
                ("username", sample.username.as_str()),
                ("uid", sample.uid.as_str()),
                ("jobid", sample.job_id()),
            ]);
            set(&self.info, info, 1.0);
        }
    }
}

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

/// Renders `samples` in the OpenMetrics text format.
///
/// A failed sample only contributes `cgroup_exporter_collect_error`, set to 1.
pub fn render(samples: &[Sample]) -> Result<String, std::fmt::Error> {
    let mut registry = Registry::with_prefix(NAMESPACE);
    let metrics = Metrics::register(&mut registry);
    for sample in samples {
        metrics.record(sample);
    }

    let mut buf = String::new();
    encode(&mut buf, &registry)?;
    Ok(buf)
}

async fn export_metrics(State(collector): State<Arc<Collector>>) -> Response {
    let samples = collector.collect().await;
    match render(&samples) {
        Ok(body) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            log::error!("Failed to encode metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn export_samples(State(collector): State<Arc<Collector>>) -> Json<Vec<Sample>> {
    Json(collector.collect().await)
}

/// HTTP front end running a collection pass per request.
pub struct Exporter {
    router: axum::Router,
}

impl Exporter {
    pub fn new(collector: Collector) -> Self {
        let router = axum::Router::new()
            .route("/metrics", get(export_metrics))
            .route("/samples", get(export_samples))
            .with_state(Arc::new(collector));
        Self { router }
    }

    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("serving metrics on http://{}/metrics", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::CollectorConfig;
    use crate::process::fake::{FakeProcs, FakeUsers};
    use crate::sample::{CpuUsage, MemoryUsage};
    use crate::slurm::JobIdentity;

    fn job_sample() -> Sample {
        let mut sample = Sample::new("/slurm/job_1");
        sample.job = JobIdentity::from_group_name(&sample.name);
        sample.uid = "1000".to_owned();
        sample.username = "alice".to_owned();
        sample.cpu = Some(CpuUsage {
            user_seconds: 3.0,
            system_seconds: 1.0,
            total_seconds: 4.0,
        });
        sample.cpus = Some(vec!["0".to_owned(), "1".to_owned()]);
        sample.memory = Some(MemoryUsage {
            rss_bytes: 600,
            cache_bytes: 400,
            used_bytes: 1000,
            total_bytes: 2048,
            fail_count: None,
        });
        sample
    }

    #[test]
    fn test_render_job_sample() {
        let body = render(&[job_sample()]).unwrap();
        let group = r#"{cgroup="/slurm/job_1",jobid="1",step="",task=""}"#;

        assert!(body.contains(&format!("cgroup_cpu_total_seconds{group} 4")));
        assert!(body.contains(&format!("cgroup_cpus{group} 2")));
        assert!(body.contains(&format!("cgroup_memory_rss_bytes{group} 600")));
        assert!(body.contains(r#"cgroup_cpu_info{cgroup="/slurm/job_1",cpus="0,1",jobid="1"} 1"#));
        assert!(body.contains(r#"cgroup_uid{jobid="1",username="alice"} 1000"#));
        assert!(body.contains(
            r#"cgroup_info{cgroup="/slurm/job_1",username="alice",uid="1000",jobid="1"} 1"#
        ));
        assert!(body.contains(r#"cgroup_exporter_collect_error{cgroup="/slurm/job_1"} 0"#));
        assert!(!body.contains(&format!("cgroup_memory_fail_count{group}")));
        assert!(!body.contains(&format!("cgroup_memsw_used_bytes{group}")));
    }

    #[test]
    fn test_render_failed_sample() {
        let body = render(&[Sample::failed("/slurm/job_2")]).unwrap();
        assert!(body.contains(r#"cgroup_exporter_collect_error{cgroup="/slurm/job_2"} 1"#));
        assert!(!body.contains(r#"cgroup="/slurm/job_2",jobid"#));
        assert!(!body.contains("cgroup_info{"));
    }

    #[test]
    fn test_render_task_sample_has_no_identity() {
        let mut sample = Sample::new("/slurm/job_1/step_0/user/task_0");
        sample.job = JobIdentity::from_group_name(&sample.name);
        sample.uid = "1000".to_owned();
        sample.username = "alice".to_owned();
        sample.cpus = Some(Vec::new());

        let body = render(&[sample]).unwrap();
        assert!(body.contains(
            r#"cgroup_cpus{cgroup="/slurm/job_1/step_0/user/task_0",jobid="1",step="0",task="0"} 0"#
        ));
        assert!(!body.contains("cgroup_uid{"));
        assert!(!body.contains("cgroup_info{"));
        assert!(!body.contains("cgroup_cpu_info{"));
    }

    fn exporter(root: &Path) -> Exporter {
        let config = CollectorConfig {
            paths: vec!["/slurm".to_owned()],
            cgroup_root: root.to_path_buf(),
            ..Default::default()
        };
        Exporter::new(Collector::with_inspectors(
            config,
            Arc::new(FakeProcs::default()),
            Arc::new(FakeUsers::default()),
        ))
    }

    async fn get(exporter: &Exporter, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = exporter
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|value| value.to_str().unwrap().to_owned());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let root = tempfile::tempdir().unwrap();
        let (status, content_type, body) = get(&exporter(root.path()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(OPENMETRICS_CONTENT_TYPE));
        assert!(body.contains(r#"cgroup_exporter_collect_error{cgroup="/slurm"} 1"#));
        assert!(body.ends_with("# EOF\n"));
    }

    #[tokio::test]
    async fn test_samples_endpoint() {
        let root = tempfile::tempdir().unwrap();
        let (status, _, body) = get(&exporter(root.path()), "/samples").await;

        assert_eq!(status, StatusCode::OK);
        let samples: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(samples[0]["name"], "/slurm");
        assert_eq!(samples[0]["failed"], true);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let root = tempfile::tempdir().unwrap();
        let (status, _, _) = get(&exporter(root.path()), "/export").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
