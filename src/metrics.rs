//! Prometheus metrics endpoint for the user store.
//!
//! Installs the global metrics recorder so the dispatcher's operation counters
//! are collected, and optionally serves the rendered snapshot over HTTP. The
//! endpoint is wired only when the binary is configured with a metrics listen
//! address; the recorder itself is harmless to leave uninstalled -- counter
//! macros become no-ops.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;

/// Error type for metrics installation.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The global metrics recorder has already been installed.
    #[error("metrics recorder already installed")]
    AlreadyInstalled,
}

/// Cheaply cloneable handle to the installed recorder; renders the current
/// snapshot in Prometheus exposition format.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    inner: Arc<PrometheusHandle>,
}

impl MetricsHandle {
    /// Render the current metrics snapshot in Prometheus exposition format.
    pub fn render(&self) -> String {
        self.inner.render()
    }
}

/// Guard so the global recorder is installed at most once per process.
/// `install_recorder()` can panic on double-install; the `OnceLock` makes
/// repeat calls safe.
static RECORDER_HANDLE: std::sync::OnceLock<MetricsHandle> = std::sync::OnceLock::new();

/// Install the global Prometheus metrics recorder.
///
/// Must run before any `metrics` macros fire for their values to be
/// collected. A second call in the same process returns
/// [`MetricsError::AlreadyInstalled`].
pub fn install_recorder() -> Result<MetricsHandle, MetricsError> {
    let mut was_set = false;
    let handle = RECORDER_HANDLE.get_or_init(|| {
        was_set = true;
        let prom_handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("PrometheusBuilder::install_recorder should succeed on first call");
        MetricsHandle {
            inner: Arc::new(prom_handle),
        }
    });

    if was_set {
        Ok(handle.clone())
    } else {
        Err(MetricsError::AlreadyInstalled)
    }
}

/// Spawn an HTTP server answering `GET /metrics` with the rendered snapshot.
///
/// Binds with `tokio::net::TcpListener` inside a spawned task; on bind
/// failure, logs an error and the task resolves immediately -- metrics are
/// ambient and must never take the store down.
pub fn serve_metrics(handle: MetricsHandle, addr: SocketAddr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move {
                    let body = h.render();
                    (
                        [(
                            axum::http::header::CONTENT_TYPE,
                            "text/plain; version=0.0.4",
                        )],
                        body,
                    )
                }
            }),
        );

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "Failed to bind metrics listener");
                return;
            }
        };

        let bound_addr = listener
            .local_addr()
            .expect("bound listener should have a local address");
        tracing::info!(addr = %bound_addr, "Metrics server listening");

        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics server error");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn install_recorder_twice_returns_already_installed() {
        let first = install_recorder();
        let second = install_recorder();

        // Exactly one of the two calls wins, regardless of what other tests
        // in this process did first.
        assert!(
            first.is_ok() || second.is_err(),
            "second install should not succeed after the first"
        );
        if first.is_ok() {
            assert!(matches!(
                second.unwrap_err(),
                MetricsError::AlreadyInstalled
            ));
        }
    }

    #[tokio::test]
    async fn serve_metrics_stays_running() {
        let _ = install_recorder();
        let handle = RECORDER_HANDLE
            .get()
            .expect("recorder should be installed after install_recorder() call")
            .clone();

        let join_handle = serve_metrics(handle, "127.0.0.1:0".parse().unwrap());

        // The server task should still be running after a short wait.
        let timeout_result = tokio::time::timeout(Duration::from_millis(20), join_handle).await;
        assert!(
            timeout_result.is_err(),
            "serve_metrics task should still be running after 20ms"
        );
    }
}
