//! Logging and metrics setup

use metrics_exporter_prometheus::PrometheusBuilder;
use pubforge_common::config::ObservabilityConfig;
use pubforge_common::metrics;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Start the Prometheus exporter when a port is configured
pub fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Metrics exporter listening");
    }

    metrics::register_metrics();
    Ok(())
}
