//! 디스패처 설정
//!
//! [`DispatcherConfig`]는 core의 [`IngestConfig`](sysrelay_core::config::IngestConfig)를
//! 기반으로 수신 루프가 쓰는 값을 제공합니다.
//!
//! # 사용 예시
//! ```
//! use sysrelay_core::config::SysrelayConfig;
//! use sysrelay_ingest::config::DispatcherConfig;
//!
//! let core_config = SysrelayConfig::default();
//! let config = DispatcherConfig::from_core(&core_config.ingest);
//! assert!(config.read_timeout().is_none());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysrelay_core::config::{IngestConfig, MAX_RECV_BUFFER_SIZE, MIN_RECV_BUFFER_SIZE};

/// 수신 디스패처 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 단위 작업당 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,
    /// 동시에 처리 중인 단위 작업 최대 수 (0이면 무제한)
    pub max_in_flight: usize,
    /// 스트림 연결 읽기 데드라인 (초, 0이면 없음)
    pub read_timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: MIN_RECV_BUFFER_SIZE,
            max_in_flight: 0,
            read_timeout_secs: 0,
        }
    }
}

impl DispatcherConfig {
    /// core의 `IngestConfig`에서 디스패처 설정을 생성합니다.
    ///
    /// 버퍼 크기는 2048..=65535로 보정됩니다.
    pub fn from_core(core: &IngestConfig) -> Self {
        Self {
            recv_buffer_size: core
                .recv_buffer_size
                .clamp(MIN_RECV_BUFFER_SIZE, MAX_RECV_BUFFER_SIZE),
            max_in_flight: core.max_in_flight,
            read_timeout_secs: core.read_timeout_secs,
        }
    }

    /// 읽기 데드라인. 0이면 `None`.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}
