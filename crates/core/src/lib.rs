//! sysrelay-core — syslog 릴레이 공통 타입과 capability
//!
//! 파싱된 메시지 모델, 싱크/시계/태스크 생성 trait, 에러, 설정, 메트릭 이름을
//! 정의합니다. 수집 로직은 `sysrelay-ingest`에 있습니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, IngestError, SinkError, SysrelayError};

// 설정
pub use config::SysrelayConfig;

// 파이프라인 trait
pub use pipeline::{
    BoxFuture, Clock, DynSink, FixedClock, Sink, SpawnOutcome, SystemClock, UnitSpawner,
};

// 도메인 타입
pub use types::{ParsedMessage, SinkEntry};
