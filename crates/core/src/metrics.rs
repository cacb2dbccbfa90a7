//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sysrelay_`
//! - 모듈명: `ingest_`, `sink_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (gauge/latency)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(sysrelay_core::metrics::INGEST_UNITS_RECEIVED_TOTAL, "transport" => "udp")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 전송 계층 레이블 키 (udp, tcp)
pub const LABEL_TRANSPORT: &str = "transport";

/// 문법 레이블 키 (legacy, structured, none)
pub const LABEL_GRAMMAR: &str = "grammar";

/// 파싱 중단 단계 레이블 키 (pri, timestamp, header, ...)
pub const LABEL_STAGE: &str = "stage";

/// 싱크 이름 레이블 키
pub const LABEL_SINK: &str = "sink";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 수신된 입력 단위 수 (counter, label: transport)
pub const INGEST_UNITS_RECEIVED_TOTAL: &str = "sysrelay_ingest_units_received_total";

/// Ingest: 부분 파싱으로 끝난 메시지 수 (counter, labels: grammar, stage)
pub const INGEST_PARSE_DEGRADED_TOTAL: &str = "sysrelay_ingest_parse_degraded_total";

/// Ingest: 수신/accept/read 에러 수 (counter, label: transport)
pub const INGEST_RECEIVE_ERRORS_TOTAL: &str = "sysrelay_ingest_receive_errors_total";

/// Ingest: 동시 처리 한도 초과로 버려진 입력 단위 수 (counter, label: transport)
pub const INGEST_UNITS_REJECTED_TOTAL: &str = "sysrelay_ingest_units_rejected_total";

// ─── Sink 메트릭 ───────────────────────────────────────────────────

/// Sink: 전달된 레코드 수 (counter, label: sink)
pub const SINK_ENTRIES_DELIVERED_TOTAL: &str = "sysrelay_sink_entries_delivered_total";

/// Sink: 전달 실패 수 (counter, label: sink)
pub const SINK_FAILURES_TOTAL: &str = "sysrelay_sink_failures_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "sysrelay_daemon_uptime_seconds";

/// Daemon: 수신 중인 소켓 수 (gauge, label: transport)
pub const DAEMON_LISTENERS: &str = "sysrelay_daemon_listeners";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "sysrelay_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `sysrelay-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Ingest
    describe_counter!(
        INGEST_UNITS_RECEIVED_TOTAL,
        "Total number of datagrams and stream connections received"
    );
    describe_counter!(
        INGEST_PARSE_DEGRADED_TOTAL,
        "Total number of messages whose parse stopped before the message body"
    );
    describe_counter!(
        INGEST_RECEIVE_ERRORS_TOTAL,
        "Total number of receive, accept and read failures"
    );
    describe_counter!(
        INGEST_UNITS_REJECTED_TOTAL,
        "Total number of units dropped because the in-flight limit was reached"
    );

    // Sink
    describe_counter!(
        SINK_ENTRIES_DELIVERED_TOTAL,
        "Total number of entries accepted by the sink"
    );
    describe_counter!(
        SINK_FAILURES_TOTAL,
        "Total number of entries the sink failed to accept"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "sysrelay daemon uptime in seconds");
    describe_gauge!(
        DAEMON_LISTENERS,
        "Number of listening sockets per transport"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        INGEST_UNITS_RECEIVED_TOTAL,
        INGEST_PARSE_DEGRADED_TOTAL,
        INGEST_RECEIVE_ERRORS_TOTAL,
        INGEST_UNITS_REJECTED_TOTAL,
        SINK_ENTRIES_DELIVERED_TOTAL,
        SINK_FAILURES_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_LISTENERS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_sysrelay_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("sysrelay_"),
                "Metric '{}' does not start with 'sysrelay_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES
            .iter()
            .filter(|n| n.contains("_ingest_") || n.contains("_sink_"))
        {
            assert!(name.ends_with("_total"), "Counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_TRANSPORT, LABEL_GRAMMAR, LABEL_STAGE, LABEL_SINK] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
