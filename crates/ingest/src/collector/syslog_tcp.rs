//! TCP syslog 수신 루프
//!
//! 연결 하나가 메시지 하나를 운반합니다. 단위 태스크는 한 번만 읽고,
//! 결과와 관계없이 연결을 닫은 뒤 파싱과 전달을 수행합니다.
//! 프레이밍(octet-counting, 개행 구분)은 해석하지 않습니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sysrelay_core::error::IngestError;
use sysrelay_core::metrics as m;
use sysrelay_core::pipeline::{SpawnOutcome, UnitSpawner};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Transport, UnitHandler};

/// TCP syslog 수집기
///
/// 이미 listen 중인 소켓을 받아 취소될 때까지 `accept`를 반복합니다.
pub struct SyslogTcpCollector {
    listener: TcpListener,
    handler: UnitHandler,
    spawner: Arc<dyn UnitSpawner>,
    recv_buffer_size: usize,
    read_timeout: Option<Duration>,
    cancel_token: CancellationToken,
}

impl SyslogTcpCollector {
    /// 새 TCP 수집기를 생성합니다.
    pub fn new(
        listener: TcpListener,
        handler: UnitHandler,
        spawner: Arc<dyn UnitSpawner>,
        recv_buffer_size: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            handler,
            spawner,
            recv_buffer_size,
            read_timeout: None,
            cancel_token,
        }
    }

    /// 연결당 읽기 데드라인을 설정합니다.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// accept 루프를 실행합니다.
    ///
    /// accept 에러는 로그로 남기고 계속 진행합니다. 취소 토큰이 발동되면 반환하며,
    /// 이미 생성된 단위 태스크는 기다리지 않습니다.
    pub async fn run(self) {
        let local_addr = self
            .listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        info!(
            addr = %local_addr,
            spawner = self.spawner.name(),
            read_timeout_secs = self.read_timeout.map(|d| d.as_secs()).unwrap_or(0),
            "TCP syslog listener started"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "accepted connection");
                            metrics::counter!(
                                m::INGEST_UNITS_RECEIVED_TOTAL,
                                m::LABEL_TRANSPORT => Transport::Tcp.as_str()
                            )
                            .increment(1);

                            let unit = read_unit(
                                stream,
                                peer,
                                self.handler.clone(),
                                self.recv_buffer_size,
                                self.read_timeout,
                            );

                            // 거부되면 unit과 함께 스트림이 드롭되어 연결이 닫힘
                            if self.spawner.spawn(Box::pin(unit)) == SpawnOutcome::Rejected {
                                warn!(%peer, "in-flight limit reached, rejecting connection");
                                metrics::counter!(
                                    m::INGEST_UNITS_REJECTED_TOTAL,
                                    m::LABEL_TRANSPORT => Transport::Tcp.as_str()
                                )
                                .increment(1);
                            }
                        }
                        Err(e) => {
                            warn!(addr = %local_addr, error = %e, "TCP accept failed");
                            metrics::counter!(
                                m::INGEST_RECEIVE_ERRORS_TOTAL,
                                m::LABEL_TRANSPORT => Transport::Tcp.as_str()
                            )
                            .increment(1);
                        }
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    info!(addr = %local_addr, "TCP syslog listener received shutdown signal");
                    break;
                }
            }
        }
    }
}

/// 연결 하나를 처리합니다: 한 번 읽고, 닫고, 전달합니다.
async fn read_unit(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: UnitHandler,
    recv_buffer_size: usize,
    read_timeout: Option<Duration>,
) {
    let peer = peer.to_string();
    let mut buf = vec![0u8; recv_buffer_size];

    let result = read_once(&mut stream, &mut buf, &peer, read_timeout).await;
    drop(stream);

    match result {
        Ok(0) => {
            debug!(peer = %peer, "connection closed without data");
        }
        Ok(len) => {
            handler.handle(&buf[..len], &peer, Transport::Tcp).await;
        }
        Err(e) => {
            warn!(peer = %peer, error = %e, "TCP read failed");
            metrics::counter!(
                m::INGEST_RECEIVE_ERRORS_TOTAL,
                m::LABEL_TRANSPORT => Transport::Tcp.as_str()
            )
            .increment(1);
        }
    }
}

async fn read_once(
    stream: &mut TcpStream,
    buf: &mut [u8],
    peer: &str,
    read_timeout: Option<Duration>,
) -> Result<usize, IngestError> {
    let to_read_error = |e: std::io::Error| IngestError::Read {
        peer: peer.to_owned(),
        reason: e.to_string(),
    };

    match read_timeout {
        Some(limit) => match timeout(limit, stream.read(buf)).await {
            Ok(result) => result.map_err(to_read_error),
            Err(_) => Err(IngestError::Timeout {
                peer: peer.to_owned(),
                secs: limit.as_secs(),
            }),
        },
        None => stream.read(buf).await.map_err(to_read_error),
    }
}
