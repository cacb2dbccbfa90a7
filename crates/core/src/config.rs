//! 설정 관리 — sysrelay.toml 파싱 및 런타임 설정
//!
//! [`SysrelayConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SYSRELAY_INGEST_MAX_IN_FLIGHT=512` 형식)
//! 3. 설정 파일 (`sysrelay.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sysrelay_core::error::SysrelayError> {
//! use sysrelay_core::config::SysrelayConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SysrelayConfig::load("sysrelay.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SysrelayConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SysrelayError};

/// RFC 5424: 2048 옥텟 메시지는 수신할 수 있어야 함 (SHOULD)
pub const MIN_RECV_BUFFER_SIZE: usize = 2048;

/// UDP 데이터그램 최대 크기
pub const MAX_RECV_BUFFER_SIZE: usize = 65535;

/// 동시 처리 단위 수 상한
pub const MAX_IN_FLIGHT: usize = 1 << 20;

/// systemd journal native 프로토콜 소켓 기본 경로
pub const DEFAULT_JOURNAL_SOCKET: &str = "/run/systemd/journal/socket";

/// sysrelay 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysrelayConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 소켓 획득 설정
    #[serde(default)]
    pub listen: ListenConfig,
    /// 싱크 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SysrelayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SysrelayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SysrelayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysrelayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SysrelayError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SysrelayError> {
        toml::from_str(toml_str).map_err(|e| {
            SysrelayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SYSRELAY_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SYSRELAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SYSRELAY_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "SYSRELAY_GENERAL_PID_FILE");

        // Ingest
        override_usize(
            &mut self.ingest.recv_buffer_size,
            "SYSRELAY_INGEST_RECV_BUFFER_SIZE",
        );
        override_usize(
            &mut self.ingest.max_in_flight,
            "SYSRELAY_INGEST_MAX_IN_FLIGHT",
        );
        override_u64(
            &mut self.ingest.read_timeout_secs,
            "SYSRELAY_INGEST_READ_TIMEOUT_SECS",
        );

        // Listen
        override_bool(
            &mut self.listen.socket_activation,
            "SYSRELAY_LISTEN_SOCKET_ACTIVATION",
        );
        override_csv(&mut self.listen.udp, "SYSRELAY_LISTEN_UDP");
        override_csv(&mut self.listen.tcp, "SYSRELAY_LISTEN_TCP");

        // Sink
        override_string(&mut self.sink.kind, "SYSRELAY_SINK_KIND");
        override_string(&mut self.sink.journal_socket, "SYSRELAY_SINK_JOURNAL_SOCKET");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SYSRELAY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SYSRELAY_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SYSRELAY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SysrelayError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 수신 버퍼 크기 검증
        if !(MIN_RECV_BUFFER_SIZE..=MAX_RECV_BUFFER_SIZE).contains(&self.ingest.recv_buffer_size) {
            return Err(ConfigError::InvalidValue {
                field: "ingest.recv_buffer_size".to_owned(),
                reason: format!(
                    "must be between {} and {}",
                    MIN_RECV_BUFFER_SIZE, MAX_RECV_BUFFER_SIZE
                ),
            }
            .into());
        }

        // 동시 처리 한도 검증 (0은 무제한)
        if self.ingest.max_in_flight > MAX_IN_FLIGHT {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_in_flight".to_owned(),
                reason: format!("must be at most {MAX_IN_FLIGHT} (0 = unlimited)"),
            }
            .into());
        }

        // sink kind 검증
        let valid_sinks = ["journald", "stdout"];
        if !valid_sinks.contains(&self.sink.kind.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "sink.kind".to_owned(),
                reason: format!("must be one of: {}", valid_sinks.join(", ")),
            }
            .into());
        }

        if self.sink.kind == "journald" && self.sink.journal_socket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sink.journal_socket".to_owned(),
                reason: "must not be empty when sink.kind is journald".to_owned(),
            }
            .into());
        }

        // listen 주소 검증 (활성화 소켓이 없을 때만 사용됨)
        for (field, addrs) in [("listen.udp", &self.listen.udp), ("listen.tcp", &self.listen.tcp)] {
            for addr in addrs {
                if addr.parse::<std::net::SocketAddr>().is_err() {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_owned(),
                        reason: format!("'{}' is not a valid socket address", addr),
                    }
                    .into());
                }
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "must not be 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 단위 작업당 수신 버퍼 크기 (바이트, 최소 2048)
    pub recv_buffer_size: usize,
    /// 동시에 처리 중인 단위 작업 최대 수 (0이면 무제한)
    pub max_in_flight: usize,
    /// 스트림 연결 읽기 데드라인 (초, 0이면 없음)
    pub read_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: MIN_RECV_BUFFER_SIZE,
            max_in_flight: 0,
            read_timeout_secs: 0,
        }
    }
}

/// 소켓 획득 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// systemd 소켓 활성화 사용 여부
    pub socket_activation: bool,
    /// 활성화 소켓이 없을 때 직접 바인드할 UDP 주소
    pub udp: Vec<String>,
    /// 활성화 소켓이 없을 때 직접 바인드할 TCP 주소
    pub tcp: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            socket_activation: true,
            udp: Vec::new(),
            tcp: Vec::new(),
        }
    }
}

/// 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// 싱크 종류 (journald, stdout)
    pub kind: String,
    /// journald native 소켓 경로
    pub journal_socket: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: "journald".to_owned(),
            journal_socket: DEFAULT_JOURNAL_SOCKET.to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = SysrelayConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingest.recv_buffer_size, 2048);
        assert_eq!(config.ingest.max_in_flight, 0);
        assert!(config.listen.socket_activation);
        assert_eq!(config.sink.kind, "journald");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        SysrelayConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = SysrelayConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.sink.journal_socket, DEFAULT_JOURNAL_SOCKET);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[ingest]
max_in_flight = 512

[sink]
kind = "stdout"
"#;
        let config = SysrelayConfig::parse(toml).unwrap();
        assert_eq!(config.ingest.max_in_flight, 512);
        // recv_buffer_size는 기본값 유지
        assert_eq!(config.ingest.recv_buffer_size, 2048);
        assert_eq!(config.sink.kind, "stdout");
        assert_eq!(config.general.log_format, "json");
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
pid_file = "/run/sysrelay.pid"

[ingest]
recv_buffer_size = 8192
max_in_flight = 1024
read_timeout_secs = 30

[listen]
socket_activation = false
udp = ["127.0.0.1:5514"]
tcp = ["127.0.0.1:5514", "[::1]:5514"]

[sink]
kind = "journald"
journal_socket = "/tmp/journal.sock"

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
"#;
        let config = SysrelayConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.pid_file, "/run/sysrelay.pid");
        assert_eq!(config.ingest.read_timeout_secs, 30);
        assert!(!config.listen.socket_activation);
        assert_eq!(config.listen.tcp.len(), 2);
        assert_eq!(config.sink.journal_socket, "/tmp/journal.sock");
        assert_eq!(config.metrics.port, 9200);
        assert_eq!(config.metrics.endpoint, "/metrics");
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = SysrelayConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            SysrelayError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = SysrelayConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = SysrelayConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_small_recv_buffer() {
        let mut config = SysrelayConfig::default();
        config.ingest.recv_buffer_size = 480;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("recv_buffer_size"));
    }

    #[test]
    fn validate_rejects_oversized_recv_buffer() {
        let mut config = SysrelayConfig::default();
        config.ingest.recv_buffer_size = 70_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_max_in_flight() {
        let mut config = SysrelayConfig::default();
        config.ingest.max_in_flight = 4_611_686_018_427_387_904;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));

        config.ingest.max_in_flight = MAX_IN_FLIGHT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_sink() {
        let mut config = SysrelayConfig::default();
        config.sink.kind = "kafka".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink.kind"));
    }

    #[test]
    fn validate_rejects_empty_journal_socket() {
        let mut config = SysrelayConfig::default();
        config.sink.journal_socket = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("journal_socket"));
    }

    #[test]
    fn validate_ignores_journal_socket_for_stdout_sink() {
        let mut config = SysrelayConfig::default();
        config.sink.kind = "stdout".to_owned();
        config.sink.journal_socket = String::new();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_listen_address() {
        let mut config = SysrelayConfig::default();
        config.listen.udp = vec!["not-an-address".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("listen.udp"));
    }

    #[test]
    fn validate_rejects_zero_metrics_port_when_enabled() {
        let mut config = SysrelayConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트로 실행되어 다른 스레드가 환경변수를 읽지 않습니다.
        unsafe { std::env::set_var("TEST_SYSRELAY_STR", "overridden") };
        override_string(&mut val, "TEST_SYSRELAY_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_SYSRELAY_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트로 실행되어 다른 스레드가 환경변수를 읽지 않습니다.
        unsafe { std::env::set_var("TEST_SYSRELAY_BOOL_BAD", "nope") };
        override_bool(&mut val, "TEST_SYSRELAY_BOOL_BAD");
        assert!(val); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_SYSRELAY_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_skips_empty_items() {
        let mut val = Vec::new();
        // SAFETY: serial 테스트로 실행되어 다른 스레드가 환경변수를 읽지 않습니다.
        unsafe { std::env::set_var("TEST_SYSRELAY_CSV", "127.0.0.1:514, ,[::1]:514") };
        override_csv(&mut val, "TEST_SYSRELAY_CSV");
        assert_eq!(val, vec!["127.0.0.1:514", "[::1]:514"]);
        unsafe { std::env::remove_var("TEST_SYSRELAY_CSV") };
    }

    #[test]
    #[serial]
    fn apply_env_overrides_updates_ingest_section() {
        let mut config = SysrelayConfig::default();
        // SAFETY: serial 테스트로 실행되어 다른 스레드가 환경변수를 읽지 않습니다.
        unsafe { std::env::set_var("SYSRELAY_INGEST_MAX_IN_FLIGHT", "64") };
        config.apply_env_overrides();
        assert_eq!(config.ingest.max_in_flight, 64);
        unsafe { std::env::remove_var("SYSRELAY_INGEST_MAX_IN_FLIGHT") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 9102u16;
        override_u16(&mut val, "TEST_SYSRELAY_NONEXISTENT_12345");
        assert_eq!(val, 9102);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = SysrelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = SysrelayConfig::parse(&toml_str).unwrap();
        assert_eq!(config.sink.kind, parsed.sink.kind);
        assert_eq!(config.ingest.recv_buffer_size, parsed.ingest.recv_buffer_size);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = SysrelayConfig::from_file("/nonexistent/path/sysrelay.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SysrelayError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sysrelay.toml");
        tokio::fs::write(&path, "[sink]\nkind = \"stdout\"\n")
            .await
            .unwrap();

        let config = SysrelayConfig::from_file(&path).await.unwrap();
        assert_eq!(config.sink.kind, "stdout");
    }
}
