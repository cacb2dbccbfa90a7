//! sysrelay-ingest -- syslog 메시지 파서, 수신 디스패처, 싱크
//!
//! # 모듈 구성
//!
//! - [`parser`]: 관대한 syslog 파서 (RFC 5424 / RFC 3164, 부분 파싱 허용)
//! - [`collector`]: UDP/TCP 수신 루프와 단위 작업 처리기
//! - [`dispatcher`]: 소켓 묶음을 받아 수신 루프들을 구동
//! - [`spawner`]: 단위 작업 태스크 생성 정책 (무제한 / 동시 처리 제한)
//! - [`sink`]: 구조화 레코드 전달 대상 (journald, stdout JSON lines)
//! - [`config`]: 디스패처 설정 (core 설정 확장)
//!
//! # 아키텍처
//!
//! ```text
//! ListenerSet -> Collectors -> UnitSpawner -> MessageParser -> SinkEntry -> Sink
//!     |              |              |                                        |
//!  UDP/TCP      recv/accept    bounded or                              journald/stdout
//!                             unbounded tasks
//! ```

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod parser;
pub mod sink;
pub mod spawner;

// --- 주요 타입 re-export ---

// 디스패처
pub use dispatcher::{IngestionDispatcher, IngestionDispatcherBuilder, ListenerSet};

// 설정
pub use config::DispatcherConfig;

// 파서
pub use parser::{Grammar, MessageParser, ParseOutcome, ParseStage};

// 수집기
pub use collector::{SyslogTcpCollector, SyslogUdpCollector, Transport, UnitHandler};

// 싱크
pub use sink::{JournaldSink, JsonLinesSink, StdoutSink};

// 태스크 생성
pub use spawner::{BoundedSpawner, UnboundedSpawner};
