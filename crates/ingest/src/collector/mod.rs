//! 수신 루프 -- 소켓에서 입력 단위를 받아 태스크로 넘깁니다.
//!
//! - [`SyslogUdpCollector`]: 데이터그램 하나 = 단위 하나
//! - [`SyslogTcpCollector`]: 연결 하나 = 단위 하나 (읽기 한 번)
//!
//! 수신 루프는 단위를 [`UnitSpawner`](sysrelay_core::pipeline::UnitSpawner)에 넘기고
//! 곧바로 다음 수신으로 돌아갑니다. 파싱과 싱크 전달은 [`UnitHandler`]가
//! 단위 태스크 안에서 수행합니다.

pub mod syslog_tcp;
pub mod syslog_udp;

pub use syslog_tcp::SyslogTcpCollector;
pub use syslog_udp::SyslogUdpCollector;

use std::fmt;
use std::sync::Arc;

use sysrelay_core::metrics as m;
use sysrelay_core::pipeline::DynSink;
use sysrelay_core::types::SinkEntry;
use tracing::{debug, warn};

use crate::parser::MessageParser;

/// 전송 계층
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// 데이터그램
    Udp,
    /// 스트림
    Tcp,
}

impl Transport {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단위 작업 처리기: 파싱 후 싱크에 한 번 전달
///
/// 싱크 실패는 로그와 카운터로만 남기고 재시도하지 않습니다.
#[derive(Clone)]
pub struct UnitHandler {
    parser: MessageParser,
    sink: Arc<dyn DynSink>,
}

impl UnitHandler {
    /// 파서와 싱크로 처리기를 생성합니다.
    pub fn new(parser: MessageParser, sink: Arc<dyn DynSink>) -> Self {
        Self { parser, sink }
    }

    /// 원시 바이트 하나를 처리합니다.
    pub async fn handle(&self, raw: &[u8], peer: &str, transport: Transport) {
        let (msg, outcome) = self.parser.parse_with_outcome(raw, peer);

        if let Some(stage) = outcome.stopped_at {
            debug!(
                peer,
                %transport,
                grammar = %outcome.grammar,
                %stage,
                "message parsed partially"
            );
            metrics::counter!(
                m::INGEST_PARSE_DEGRADED_TOTAL,
                m::LABEL_GRAMMAR => outcome.grammar.as_str(),
                m::LABEL_STAGE => stage.as_str()
            )
            .increment(1);
        }

        let sink_name = self.sink.name().to_owned();
        match self.sink.deliver(SinkEntry::from(msg)).await {
            Ok(()) => {
                metrics::counter!(m::SINK_ENTRIES_DELIVERED_TOTAL, m::LABEL_SINK => sink_name)
                    .increment(1);
            }
            Err(e) => {
                warn!(peer, %transport, sink = %sink_name, error = %e, "sink delivery failed");
                metrics::counter!(m::SINK_FAILURES_TOTAL, m::LABEL_SINK => sink_name)
                    .increment(1);
            }
        }
    }
}

impl fmt::Debug for UnitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandler")
            .field("parser", &self.parser)
            .field("sink", &self.sink.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use sysrelay_core::error::SinkError;
    use sysrelay_core::pipeline::{FixedClock, Sink};
    use sysrelay_core::types::ATTR_SOURCE;

    struct RecordingSink {
        entries: Mutex<Vec<SinkEntry>>,
        fail: bool,
    }

    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, entry: SinkEntry) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("down".to_owned()));
            }
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    fn handler(fail: bool) -> (UnitHandler, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
            fail,
        });
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
        let parser = MessageParser::new(Arc::new(clock));
        (UnitHandler::new(parser, sink.clone()), sink)
    }

    #[tokio::test]
    async fn delivers_parsed_entry() {
        let (handler, sink) = handler(false);
        handler
            .handle(b"<13>Dec 15 11:55:02 host user: message", "10.0.0.1:40000", Transport::Udp)
            .await;

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "message");
        assert_eq!(entries[0].priority, 5);
        assert_eq!(entries[0].attributes[ATTR_SOURCE], "10.0.0.1:40000");
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let (handler, sink) = handler(true);
        handler.handle(b"anything", "10.0.0.1:40000", Transport::Tcp).await;
        assert!(sink.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn transport_labels() {
        assert_eq!(Transport::Udp.to_string(), "udp");
        assert_eq!(Transport::Tcp.as_str(), "tcp");
    }
}
