//! sysrelay daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production, `sysrelay-daemon` is used as a binary (main.rs).

pub mod activation;
pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
