//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Metrics collection and export utilities."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Prometheus registry shared by the daemon and its store, plus the
//! `/metrics` scrape endpoint.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use prometheus;

/// Registry handle passed to every component that records metrics.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every family in `registry` in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<String> {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("failed to encode metric families")
}

async fn scrape(State(registry): State<SharedRegistry>) -> Response {
    match render(&registry) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "metrics scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error").into_response()
        }
    }
}

/// Bind `addr` and serve `registry` at `/metrics` until shut down.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new()
        .route("/metrics", get(scrape))
        .with_state(registry);

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    std_listener
        .set_nonblocking(true)
        .context("failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .context("failed to read metrics listener address")?;
    let listener =
        TcpListener::from_std(std_listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        info!(address = %bound, "metrics exporter listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics exporter failed")
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task,
    })
}

/// Running exporter; dropping it without [`MetricsServer::shutdown`] leaves
/// the task serving until the runtime stops.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting scrapes and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.context("metrics exporter task panicked")?
    }
}

/// Process-level metrics for `splitwatchd`.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "splitwatchd_starts_total",
            "Times the splitwatch daemon has started",
        ))?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "splitwatchd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(prometheus::exponential_buckets(0.0005, 2.0, 12)?),
        )?;
        let build_info = GaugeVec::new(
            Opts::new("splitwatchd_build_info", "Version of the running daemon"),
            &["version", "profile"],
        )?;

        registry.register(Box::new(starts_total.clone()))?;
        registry.register(Box::new(config_load_seconds.clone()))?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count one start and publish how long configuration took to load.
    pub fn record_startup(&self, config_load: Duration, version: &str, profile: &str) {
        self.starts_total.inc();
        self.config_load_seconds.observe(config_load.as_secs_f64());
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

impl std::fmt::Debug for DaemonMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_startup_metrics() {
        let registry = new_registry();
        let metrics = DaemonMetrics::new(registry.clone()).unwrap();
        metrics.record_startup(Duration::from_millis(2), "0.1.0", "debug");

        let body = render(&registry).unwrap();
        assert!(body.contains("splitwatchd_starts_total 1"));
        assert!(body.contains("splitwatchd_config_load_seconds_count 1"));
        assert!(body.contains("splitwatchd_build_info{profile=\"debug\",version=\"0.1.0\"} 1"));
    }

    #[tokio::test]
    async fn exporter_serves_registry_over_http() {
        let registry = new_registry();
        DaemonMetrics::new(registry.clone())
            .unwrap()
            .record_startup(Duration::ZERO, "0.1.0", "release");

        let server = spawn_http_server(registry, "127.0.0.1:0".parse().unwrap()).unwrap();
        let response = reqwest::get(format!("http://{}/metrics", server.addr()))
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response.text().await.unwrap().contains("splitwatchd_starts_total 1"));

        let missing = reqwest::get(format!("http://{}/", server.addr())).await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
        server.shutdown().await.unwrap();
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = new_registry();
        DaemonMetrics::new(registry.clone()).unwrap();
        assert!(DaemonMetrics::new(registry).is_err());
    }
}
