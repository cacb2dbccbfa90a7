//! 싱크 구현
//!
//! - [`JournaldSink`]: systemd journal native 프로토콜
//! - [`StdoutSink`]: JSON Lines (표준 출력)

pub mod journald;
pub mod stdout;

pub use journald::JournaldSink;
pub use stdout::{JsonLinesSink, StdoutSink};

use std::sync::Arc;

use sysrelay_core::config::SinkConfig;
use sysrelay_core::error::{ConfigError, SysrelayError};
use sysrelay_core::pipeline::DynSink;

/// 설정의 `kind`에 맞는 싱크를 생성합니다.
pub fn from_config(config: &SinkConfig) -> Result<Arc<dyn DynSink>, SysrelayError> {
    match config.kind.as_str() {
        "journald" => Ok(Arc::new(JournaldSink::new(&config.journal_socket)?)),
        "stdout" => Ok(Arc::new(StdoutSink::stdout())),
        other => Err(ConfigError::InvalidValue {
            field: "sink.kind".to_owned(),
            reason: format!("unknown sink '{}'", other),
        }
        .into()),
    }
}
