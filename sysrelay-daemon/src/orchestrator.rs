//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, acquires sockets, builds the
//! sink and the ingestion dispatcher, and runs until a shutdown signal.
//!
//! # Startup
//!
//! 1. Metrics recorder (when `[metrics] enabled`)
//! 2. Sink (`[sink] kind`)
//! 3. Listeners (socket activation, then `[listen]` fallback)
//! 4. Dispatcher
//!
//! # Shutdown
//!
//! Listener loops are cancelled. Units already in flight are not awaited;
//! the process exits once every loop has returned.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use sysrelay_core::config::SysrelayConfig;
use sysrelay_core::error::{ConfigError, SysrelayError};
use sysrelay_core::metrics as m;
use sysrelay_core::pipeline::DynSink;
use sysrelay_ingest::{
    DispatcherConfig, IngestionDispatcher, IngestionDispatcherBuilder, ListenerSet, sink,
};

use crate::activation;
use crate::metrics_server;

/// Load `sysrelay.toml` with environment overrides applied.
///
/// A missing file at the default location is not an error: the daemon then
/// runs on built-in defaults (plus environment overrides). Validation is
/// left to the caller so CLI overrides can be applied first.
pub async fn load_config(path: &Path, allow_missing: bool) -> Result<SysrelayConfig> {
    let mut config = match SysrelayConfig::from_file(path).await {
        Ok(config) => config,
        Err(SysrelayError::Config(ConfigError::FileNotFound { .. })) if allow_missing => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            SysrelayConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SysrelayConfig,
    /// Ingestion dispatcher owning all listener sockets.
    dispatcher: IngestionDispatcher,
    /// Cancels listener loops and background tasks.
    cancel_token: CancellationToken,
    /// Daemon start time (for the uptime gauge).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from configuration: metrics, sink, listeners, dispatcher.
    ///
    /// # Errors
    ///
    /// - Configuration validation fails
    /// - The metrics endpoint or the sink cannot be set up
    /// - No sockets were supplied or bound
    pub async fn build_from_config(config: SysrelayConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let sink = sink::from_config(&config.sink)
            .map_err(|e| anyhow::anyhow!("failed to build sink: {}", e))?;
        tracing::info!(sink = sink.name(), "sink initialized");

        let listeners = activation::acquire_listeners(&config.listen)
            .await
            .map_err(|e| anyhow::anyhow!("failed to acquire listeners: {}", e))?;

        Self::build_with(config, listeners, sink)
    }

    /// Build from already-acquired sockets and sink.
    ///
    /// Useful for tests and embedding; does not install the metrics recorder.
    pub fn build_with(
        config: SysrelayConfig,
        listeners: ListenerSet,
        sink: Arc<dyn DynSink>,
    ) -> Result<Self> {
        let dispatcher = IngestionDispatcherBuilder::new()
            .listeners(listeners)
            .sink(sink)
            .config(DispatcherConfig::from_core(&config.ingest))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build ingestion dispatcher: {}", e))?;

        tracing::info!(
            udp = dispatcher.udp_count(),
            tcp = dispatcher.tcp_count(),
            max_in_flight = config.ingest.max_in_flight,
            recv_buffer_size = dispatcher.config().recv_buffer_size,
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(&dispatcher);
        }

        Ok(Self {
            config,
            dispatcher,
            cancel_token: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Run until `SIGTERM` or `SIGINT`.
    pub async fn run(self) -> Result<()> {
        let shutdown = async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        };
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` completes or [`cancel_token`](Self::cancel_token)
    /// is cancelled.
    ///
    /// Writes the PID file (if configured) before serving and removes it
    /// after every listener loop has returned.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            dispatcher,
            cancel_token,
            start_time,
        } = self;

        let pid_path = (!config.general.pid_file.is_empty())
            .then(|| Path::new(&config.general.pid_file).to_path_buf());
        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        let uptime_task = config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(start_time, cancel_token.child_token()));

        let mut dispatcher_task = tokio::spawn(dispatcher.run(cancel_token.child_token()));
        tracing::info!("sysrelay-daemon running");

        tokio::select! {
            _ = shutdown => {}
            _ = cancel_token.cancelled() => {
                tracing::info!("shutdown requested via cancellation token");
            }
            result = &mut dispatcher_task => {
                // loops only return after cancellation
                tracing::error!(result = ?result, "ingestion dispatcher exited unexpectedly");
            }
        }

        tracing::info!("cancelling listener loops");
        cancel_token.cancel();

        if !dispatcher_task.is_finished() {
            if let Err(e) = dispatcher_task.await {
                tracing::error!(error = %e, "ingestion dispatcher task failed");
            }
        }
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }

        tracing::info!("sysrelay-daemon stopped");
        Ok(())
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SysrelayConfig {
        &self.config
    }

    /// Token that stops the daemon when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// The file is created atomically with `create_new`, so a stale or
/// concurrent instance is reported instead of overwritten. Parent
/// directories are created with mode 0700, the file with mode 0600.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(parent)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    file.set_permissions(fs::Permissions::from_mode(0o600))?;

    let pid = std::process::id();
    writeln!(file, "{}", pid)?;

    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on shutdown. Failures are only logged.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Record daemon-level gauges (build info, listener counts).
#[allow(clippy::cast_precision_loss)]
fn record_daemon_metrics(dispatcher: &IngestionDispatcher) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    metrics::gauge!(m::DAEMON_LISTENERS, m::LABEL_TRANSPORT => "udp")
        .set(dispatcher.udp_count() as f64);
    metrics::gauge!(m::DAEMON_LISTENERS, m::LABEL_TRANSPORT => "tcp")
        .set(dispatcher.tcp_count() as f64);
}

/// Refresh the uptime gauge every 10 seconds until cancelled.
fn spawn_uptime_updater(
    start_time: Instant,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = cancel_token.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
