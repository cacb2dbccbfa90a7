//! 에러 타입 — 도메인별 에러 정의
//!
//! 파싱 실패는 에러가 아닙니다. 파서는 항상 [`ParsedMessage`](crate::types::ParsedMessage)를
//! 반환하고, 실패는 부분 파싱 결과로 흡수됩니다.

/// sysrelay 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SysrelayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 싱크 전달 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 수집 에러
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 싱크 전달 에러
///
/// 단위 작업 경계에서 로그로 남기고 버립니다. 재시도하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 싱크에 연결할 수 없음
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// 싱크가 레코드를 거부함 (크기 초과 등)
    #[error("entry rejected: {0}")]
    Rejected(String),

    /// 레코드 직렬화 실패
    #[error("failed to encode entry: {0}")]
    Encode(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 수집(소켓 수신) 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 수신할 소켓이 하나도 없음 (시작 시 치명적 설정 오류)
    #[error("no datagram or stream sockets supplied")]
    NoSockets,

    /// 디스패처 구성 요소 누락 (싱크 등)
    #[error("missing dispatcher component: {0}")]
    MissingComponent(String),

    /// 소켓 준비 실패 (바인드, 변환 등)
    #[error("socket error: {kind}: {reason}")]
    Socket { kind: String, reason: String },

    /// 단위 작업 읽기 실패
    #[error("read error from {peer}: {reason}")]
    Read { peer: String, reason: String },

    /// 읽기 타임아웃
    #[error("read from {peer} timed out after {secs}s")]
    Timeout { peer: String, secs: u64 },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
