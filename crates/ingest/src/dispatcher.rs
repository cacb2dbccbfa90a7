//! 수신 디스패처 -- 준비된 소켓들을 파싱된 메시지 흐름으로 바꿉니다.
//!
//! # 내부 아키텍처
//! ```text
//! UdpSocket   -> recv_from loop -> UnitSpawner -> parse -> SinkEntry -> Sink
//! TcpListener -> accept loop    -> UnitSpawner -> read once, close -> parse -> Sink
//! ```
//!
//! 소켓마다 루프 태스크 하나, 입력 단위마다 태스크 하나가 생성되며
//! 단위 간 순서는 보장하지 않습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use sysrelay_core::error::IngestError;
use sysrelay_core::pipeline::{DynSink, UnitSpawner};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::collector::{SyslogTcpCollector, SyslogUdpCollector, UnitHandler};
use crate::config::DispatcherConfig;
use crate::parser::MessageParser;
use crate::spawner;

/// 수신할 소켓 묶음
///
/// 디스패처는 이 소켓들을 바인드하거나 닫지 않고 그대로 사용합니다.
#[derive(Debug, Default)]
pub struct ListenerSet {
    /// 데이터그램 소켓
    pub datagram: Vec<UdpSocket>,
    /// 스트림 listen 소켓
    pub stream: Vec<TcpListener>,
}

impl ListenerSet {
    /// 빈 묶음을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터그램 소켓을 추가합니다.
    pub fn with_udp(mut self, socket: UdpSocket) -> Self {
        self.datagram.push(socket);
        self
    }

    /// 스트림 listen 소켓을 추가합니다.
    pub fn with_tcp(mut self, listener: TcpListener) -> Self {
        self.stream.push(listener);
        self
    }

    /// 주소 목록에 직접 바인드합니다 (소켓 활성화를 쓰지 않을 때).
    pub async fn bind(udp: &[String], tcp: &[String]) -> Result<Self, IngestError> {
        let mut set = Self::new();

        for addr in udp {
            let socket = UdpSocket::bind(addr.as_str())
                .await
                .map_err(|e| IngestError::Socket {
                    kind: "udp".to_owned(),
                    reason: format!("failed to bind {}: {}", addr, e),
                })?;
            set.datagram.push(socket);
        }

        for addr in tcp {
            let listener = TcpListener::bind(addr.as_str())
                .await
                .map_err(|e| IngestError::Socket {
                    kind: "tcp".to_owned(),
                    reason: format!("failed to bind {}: {}", addr, e),
                })?;
            set.stream.push(listener);
        }

        Ok(set)
    }

    /// 소켓이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.datagram.is_empty() && self.stream.is_empty()
    }

    /// 전체 소켓 수
    pub fn len(&self) -> usize {
        self.datagram.len() + self.stream.len()
    }

    /// 데이터그램 소켓들의 로컬 주소
    pub fn udp_addrs(&self) -> Vec<SocketAddr> {
        self.datagram
            .iter()
            .filter_map(|s| s.local_addr().ok())
            .collect()
    }

    /// 스트림 소켓들의 로컬 주소
    pub fn tcp_addrs(&self) -> Vec<SocketAddr> {
        self.stream
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }
}

/// 수신 디스패처
///
/// # 사용 예시
/// ```ignore
/// let dispatcher = IngestionDispatcherBuilder::new()
///     .listeners(listeners)
///     .sink(sink)
///     .config(DispatcherConfig::from_core(&config.ingest))
///     .build()?;
///
/// dispatcher.run(cancel_token).await;
/// ```
pub struct IngestionDispatcher {
    listeners: ListenerSet,
    handler: UnitHandler,
    spawner: Arc<dyn UnitSpawner>,
    config: DispatcherConfig,
}

impl IngestionDispatcher {
    /// 디스패처를 생성합니다.
    ///
    /// 소켓이 하나도 없으면 [`IngestError::NoSockets`]를 반환합니다.
    pub fn new(
        listeners: ListenerSet,
        sink: Arc<dyn DynSink>,
        parser: MessageParser,
        spawner: Arc<dyn UnitSpawner>,
        config: DispatcherConfig,
    ) -> Result<Self, IngestError> {
        if listeners.is_empty() {
            return Err(IngestError::NoSockets);
        }

        Ok(Self {
            listeners,
            handler: UnitHandler::new(parser, sink),
            spawner,
            config,
        })
    }

    /// 데이터그램 소켓 수
    pub fn udp_count(&self) -> usize {
        self.listeners.datagram.len()
    }

    /// 스트림 소켓 수
    pub fn tcp_count(&self) -> usize {
        self.listeners.stream.len()
    }

    /// 디스패처 설정
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 소켓마다 수신 루프를 띄우고 모두 끝날 때까지 기다립니다.
    ///
    /// 루프는 정상적으로는 끝나지 않으며, `cancel_token`이 발동되면 반환합니다.
    /// 진행 중인 단위 태스크는 기다리지 않습니다.
    pub async fn run(self, cancel_token: CancellationToken) {
        let mut loops = JoinSet::new();

        for socket in self.listeners.datagram {
            let collector = SyslogUdpCollector::new(
                socket,
                self.handler.clone(),
                Arc::clone(&self.spawner),
                self.config.recv_buffer_size,
                cancel_token.child_token(),
            );
            loops.spawn(collector.run());
        }

        for listener in self.listeners.stream {
            let collector = SyslogTcpCollector::new(
                listener,
                self.handler.clone(),
                Arc::clone(&self.spawner),
                self.config.recv_buffer_size,
                cancel_token.child_token(),
            )
            .with_read_timeout(self.config.read_timeout());
            loops.spawn(collector.run());
        }

        info!(
            loops = loops.len(),
            spawner = self.spawner.name(),
            "ingestion dispatcher running"
        );

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "listener loop terminated abnormally");
            }
        }

        info!("ingestion dispatcher stopped");
    }
}

/// 디스패처 빌더
pub struct IngestionDispatcherBuilder {
    listeners: ListenerSet,
    sink: Option<Arc<dyn DynSink>>,
    parser: MessageParser,
    spawner: Option<Arc<dyn UnitSpawner>>,
    config: DispatcherConfig,
}

impl IngestionDispatcherBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            listeners: ListenerSet::new(),
            sink: None,
            parser: MessageParser::default(),
            spawner: None,
            config: DispatcherConfig::default(),
        }
    }

    /// 수신할 소켓 묶음을 지정합니다.
    pub fn listeners(mut self, listeners: ListenerSet) -> Self {
        self.listeners = listeners;
        self
    }

    /// 싱크를 지정합니다.
    pub fn sink(mut self, sink: Arc<dyn DynSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 파서를 지정합니다 (기본: 시스템 시계).
    pub fn parser(mut self, parser: MessageParser) -> Self {
        self.parser = parser;
        self
    }

    /// 태스크 생성 정책을 지정합니다 (기본: `config.max_in_flight`로 결정).
    pub fn spawner(mut self, spawner: Arc<dyn UnitSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// 디스패처 설정을 지정합니다.
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// 디스패처를 빌드합니다.
    ///
    /// 싱크가 지정되지 않았거나 소켓이 없으면 실패합니다.
    pub fn build(self) -> Result<IngestionDispatcher, IngestError> {
        let sink = self
            .sink
            .ok_or_else(|| IngestError::MissingComponent("sink".to_owned()))?;
        let spawner = self
            .spawner
            .unwrap_or_else(|| spawner::from_max_in_flight(self.config.max_in_flight));

        IngestionDispatcher::new(self.listeners, sink, self.parser, spawner, self.config)
    }
}

impl Default for IngestionDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
