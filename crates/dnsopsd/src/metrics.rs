//! Prometheus metrics and the metrics/health HTTP endpoint.
//!
//! All metrics live under the `dnsops` namespace and are exposed via
//! `GET /metrics`; `GET /health` answers `200 OK` for liveness probes.
//! The endpoint is strictly read-only and runs on its own server task.

use axum::{routing::get, Router};
use dnsops_core::ControllerEvent;
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use tracing::{error, info};

const METRICS_NAMESPACE: &str = "dnsops";

/// Global Prometheus metrics registry.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Duration of reconciliation ticks in seconds.
pub static TICK_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_tick_duration_seconds"),
        "Duration of reconciliation ticks in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of reconciliation ticks by outcome.
///
/// Labels:
/// - `status`: `success` or `error`
pub static TICKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ticks_total"),
        "Total number of reconciliation ticks by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of applied record changes by class.
///
/// Labels:
/// - `class`: `create`, `update` or `delete`
pub static CHANGES_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_changes_applied_total"),
        "Total number of applied record changes by class",
    );
    let counter = CounterVec::new(opts, &["class"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Records one controller event into the metrics.
pub fn record_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::TickCompleted {
            duration,
            created,
            updated,
            deleted,
        } => {
            TICKS_TOTAL.with_label_values(&["success"]).inc();
            TICK_DURATION_SECONDS.observe(duration.as_secs_f64());
            CHANGES_APPLIED_TOTAL
                .with_label_values(&["create"])
                .inc_by(*created as f64);
            CHANGES_APPLIED_TOTAL
                .with_label_values(&["update"])
                .inc_by(*updated as f64);
            CHANGES_APPLIED_TOTAL
                .with_label_values(&["delete"])
                .inc_by(*deleted as f64);
        }
        ControllerEvent::TickFailed { duration, .. } => {
            TICKS_TOTAL.with_label_values(&["error"]).inc();
            TICK_DURATION_SECONDS.observe(duration.as_secs_f64());
        }
    }
}

/// Gathers and encodes all metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

/// Starts the metrics and health HTTP server on `bind_addr`.
pub fn start_metrics_server(bind_addr: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        async fn health_handler() -> &'static str {
            "OK"
        }

        async fn metrics_handler() -> String {
            match gather_metrics() {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "failed to gather metrics");
                    String::from("# error gathering metrics\n")
                }
            }
        }

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler));

        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(address = %bind_addr, error = %e, "failed to bind metrics server");
                return;
            }
        };
        info!(address = %bind_addr, "metrics server listening");

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "metrics server error");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn recorded_events_show_up_in_the_exposition() {
        record_event(&ControllerEvent::TickCompleted {
            duration: Duration::from_millis(120),
            created: 2,
            updated: 1,
            deleted: 0,
        });
        record_event(&ControllerEvent::TickFailed {
            duration: Duration::from_millis(80),
            error: "provider unavailable".to_string(),
        });

        let text = gather_metrics().unwrap();
        assert!(text.contains("dnsops_ticks_total"));
        assert!(text.contains("dnsops_tick_duration_seconds"));
        assert!(text.contains("dnsops_changes_applied_total"));
    }

    #[tokio::test]
    async fn health_endpoint_answers_ok() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let _server = start_metrics_server(addr.to_string());
        // Give the server a moment to bind.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /health HTTP/1.0\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1."));
        assert!(response.contains(" 200 "));
        assert!(response.ends_with("OK"));
    }
}
