//! Orchestrator integration tests.
//!
//! Runs the assembled daemon on loopback sockets with a recording sink:
//! build -> run -> deliver -> shutdown -> PID file cleanup.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

use sysrelay_core::config::SysrelayConfig;
use sysrelay_core::error::SinkError;
use sysrelay_core::pipeline::Sink;
use sysrelay_core::types::SinkEntry;
use sysrelay_daemon::orchestrator::Orchestrator;
use sysrelay_ingest::ListenerSet;

struct RecordingSink(mpsc::UnboundedSender<SinkEntry>);

impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, entry: SinkEntry) -> Result<(), SinkError> {
        let _ = self.0.send(entry);
        Ok(())
    }
}

fn test_config(pid_file: &str) -> SysrelayConfig {
    let toml_str = format!(
        r#"
[general]
pid_file = "{pid_file}"

[listen]
socket_activation = false

[sink]
kind = "stdout"
"#
    );
    SysrelayConfig::parse(&toml_str).expect("failed to parse test config")
}

#[tokio::test]
async fn test_run_delivers_and_cleans_up_pid_file() {
    // Given: an orchestrator with one loopback UDP socket and a PID file
    let dir = TempDir::new().unwrap();
    let pid_path = dir.path().join("sysrelay.pid");
    let config = test_config(&pid_path.display().to_string());

    let listeners = ListenerSet::bind(&["127.0.0.1:0".to_owned()], &[])
        .await
        .unwrap();
    let addr = listeners.udp_addrs()[0];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator =
        Orchestrator::build_with(config, listeners, Arc::new(RecordingSink(tx))).unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(orchestrator.run_until(async {
        let _ = shutdown_rx.await;
    }));

    // When: a message arrives
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed", addr)
        .await
        .unwrap();

    // Then: it reaches the sink and the PID file exists while running
    let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.message, "'su root' failed");
    assert_eq!(entry.priority, 2);
    assert!(pid_path.exists(), "PID file should exist while running");

    // And: shutdown removes the PID file
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
}

#[tokio::test]
async fn test_cancel_token_stops_daemon() {
    let listeners = ListenerSet::bind(&[], &["127.0.0.1:0".to_owned()])
        .await
        .unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let orchestrator =
        Orchestrator::build_with(test_config(""), listeners, Arc::new(RecordingSink(tx)))
            .unwrap();
    assert_eq!(orchestrator.config().sink.kind, "stdout");

    let cancel = orchestrator.cancel_token();
    let task = tokio::spawn(orchestrator.run_until(std::future::pending()));
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_existing_pid_file_aborts_startup() {
    let dir = TempDir::new().unwrap();
    let pid_path = dir.path().join("sysrelay.pid");
    std::fs::write(&pid_path, "4242").unwrap();

    let listeners = ListenerSet::bind(&["127.0.0.1:0".to_owned()], &[])
        .await
        .unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::build_with(
        test_config(&pid_path.display().to_string()),
        listeners,
        Arc::new(RecordingSink(tx)),
    )
    .unwrap();

    let err = orchestrator
        .run_until(std::future::ready(()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("4242"));
    // the other instance's PID file is left alone
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242");
}

#[tokio::test]
async fn test_build_from_config_binds_fallback_addresses() {
    let mut config = test_config("");
    config.listen.udp = vec!["127.0.0.1:0".to_owned()];

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let cancel = orchestrator.cancel_token();
    let task = tokio::spawn(orchestrator.run_until(std::future::pending()));
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_build_from_config_without_sockets_fails() {
    let err = match Orchestrator::build_from_config(test_config("")).await {
        Ok(_) => panic!("startup without sockets should fail"),
        Err(e) => e,
    };
    assert!(
        err.to_string().contains("no datagram or stream sockets"),
        "got: {}",
        err
    );
}
