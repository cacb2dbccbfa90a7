//! UDP syslog 수신 루프
//!
//! 데이터그램 하나를 하나의 메시지로 취급합니다. 수신 버퍼보다 긴 데이터그램은
//! 버퍼 크기에서 잘립니다.

use std::sync::Arc;

use sysrelay_core::metrics as m;
use sysrelay_core::pipeline::{SpawnOutcome, UnitSpawner};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Transport, UnitHandler};

/// UDP syslog 수집기
///
/// 이미 바인드된 소켓을 받아 취소될 때까지 `recv_from`을 반복합니다.
/// 소켓을 직접 바인드하거나 닫지 않습니다.
pub struct SyslogUdpCollector {
    socket: UdpSocket,
    handler: UnitHandler,
    spawner: Arc<dyn UnitSpawner>,
    recv_buffer_size: usize,
    cancel_token: CancellationToken,
}

impl SyslogUdpCollector {
    /// 새 UDP 수집기를 생성합니다.
    pub fn new(
        socket: UdpSocket,
        handler: UnitHandler,
        spawner: Arc<dyn UnitSpawner>,
        recv_buffer_size: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket,
            handler,
            spawner,
            recv_buffer_size,
            cancel_token,
        }
    }

    /// 수신 루프를 실행합니다.
    ///
    /// 수신 에러는 로그로 남기고 계속 진행합니다. 취소 토큰이 발동되면 반환합니다.
    pub async fn run(self) {
        let local_addr = self
            .socket
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        info!(addr = %local_addr, spawner = self.spawner.name(), "UDP syslog listener started");

        loop {
            let mut buf = vec![0u8; self.recv_buffer_size];

            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            metrics::counter!(
                                m::INGEST_UNITS_RECEIVED_TOTAL,
                                m::LABEL_TRANSPORT => Transport::Udp.as_str()
                            )
                            .increment(1);

                            buf.truncate(len);
                            let handler = self.handler.clone();
                            let peer = peer.to_string();
                            let outcome = self.spawner.spawn(Box::pin(async move {
                                handler.handle(&buf, &peer, Transport::Udp).await;
                            }));

                            if outcome == SpawnOutcome::Rejected {
                                warn!(addr = %local_addr, "in-flight limit reached, dropping datagram");
                                metrics::counter!(
                                    m::INGEST_UNITS_REJECTED_TOTAL,
                                    m::LABEL_TRANSPORT => Transport::Udp.as_str()
                                )
                                .increment(1);
                            }
                        }
                        Err(e) => {
                            warn!(addr = %local_addr, error = %e, "UDP receive failed");
                            metrics::counter!(
                                m::INGEST_RECEIVE_ERRORS_TOTAL,
                                m::LABEL_TRANSPORT => Transport::Udp.as_str()
                            )
                            .increment(1);
                        }
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    info!(addr = %local_addr, "UDP syslog listener received shutdown signal");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sysrelay_core::error::SinkError;
    use sysrelay_core::pipeline::Sink;
    use sysrelay_core::types::SinkEntry;
    use tokio::sync::mpsc;

    use crate::parser::MessageParser;
    use crate::spawner::{BoundedSpawner, UnboundedSpawner};

    struct ChannelSink(mpsc::UnboundedSender<SinkEntry>);

    impl Sink for ChannelSink {
        fn name(&self) -> &str {
            "channel"
        }

        async fn deliver(&self, entry: SinkEntry) -> Result<(), SinkError> {
            let _ = self.0.send(entry);
            Ok(())
        }
    }

    async fn start(
        spawner: Arc<dyn UnitSpawner>,
        recv_buffer_size: usize,
    ) -> (
        std::net::SocketAddr,
        mpsc::UnboundedReceiver<SinkEntry>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelSink(tx));
        let handler = UnitHandler::new(MessageParser::default(), sink);
        let cancel = CancellationToken::new();

        let collector =
            SyslogUdpCollector::new(socket, handler, spawner, recv_buffer_size, cancel.clone());
        let task = tokio::spawn(collector.run());
        (addr, rx, cancel, task)
    }

    #[tokio::test]
    async fn receives_datagram_and_delivers() {
        let (addr, mut rx, cancel, task) = start(Arc::new(UnboundedSpawner), 2048).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"<13>Dec 15 11:55:02 host user: message", addr)
            .await
            .unwrap();

        let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.message, "message");
        assert_eq!(
            entry.attributes["SYSLOG_SOURCE"],
            client.local_addr().unwrap().to_string()
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn empty_datagram_is_delivered() {
        let (addr, mut rx, cancel, task) = start(Arc::new(UnboundedSpawner), 2048).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"", addr).await.unwrap();

        let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.message, "");
        assert_eq!(entry.priority, 5);
        assert_eq!(
            entry.attributes["SYSLOG_SOURCE"],
            client.local_addr().unwrap().to_string()
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn datagram_is_truncated_to_buffer_size() {
        let (addr, mut rx, cancel, task) = start(Arc::new(BoundedSpawner::new(4)), 2048).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let payload = vec![b'a'; 4000];
        client.send_to(&payload, addr).await.unwrap();

        let entry = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.message.len(), 2048);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let (_addr, _rx, cancel, task) = start(Arc::new(UnboundedSpawner), 2048).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
