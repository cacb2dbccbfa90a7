//! CLI argument definitions for sysrelay-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use sysrelay_core::config::SysrelayConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sysrelay/sysrelay.toml";

/// sysrelay syslog forwarding daemon.
///
/// Receives syslog messages on activated (or directly bound) UDP and TCP
/// sockets and forwards them to the systemd journal.
#[derive(Parser, Debug)]
#[command(name = "sysrelay-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sysrelay.toml configuration file.
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut SysrelayConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }

    /// Whether `--config` still points at the default location.
    pub fn uses_default_config(&self) -> bool {
        self.config.as_os_str() == DEFAULT_CONFIG_PATH
    }
}
