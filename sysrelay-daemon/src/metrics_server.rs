//! Prometheus metrics HTTP endpoint.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//!
//! # Usage
//!
//! ```ignore
//! if config.metrics.enabled {
//!     install_metrics_recorder(&config.metrics)?;
//! }
//! // metrics::counter!() calls in sysrelay-ingest are now exported
//! ```

use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use sysrelay_core::config::MetricsConfig;

/// The only scrape path the built-in listener serves.
const SUPPORTED_ENDPOINT: &str = "/metrics";

/// Resolve the scrape listener address from `[metrics]`.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != SUPPORTED_ENDPOINT {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '{}' is supported",
            config.endpoint,
            SUPPORTED_ENDPOINT
        ));
    }

    let ip: IpAddr = config.listen_addr.parse().map_err(|e| {
        anyhow::anyhow!("invalid metrics listen address '{}': {}", config.listen_addr, e)
    })?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process; a second call fails because the global
/// recorder is already set.
///
/// # Errors
///
/// - Unsupported endpoint or unparsable address
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<SocketAddr> {
    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    sysrelay_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(addr)
}
