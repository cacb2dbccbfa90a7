//! syslog 파서 -- PRI 디코딩 후 structured(RFC 5424) / legacy(RFC 3164) 문법으로 분기
//!
//! [`MessageParser`]는 절대 실패하지 않습니다. 각 단계는 앞 단계가 성공했을 때만
//! 실행되고, 실패한 지점에서 소비되지 않은 나머지 전체가 `message`가 됩니다.
//! 앞에서 채운 필드는 되돌리지 않습니다.
//!
//! # 사용 예시
//! ```
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use sysrelay_core::pipeline::FixedClock;
//! use sysrelay_ingest::parser::MessageParser;
//!
//! let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
//! let parser = MessageParser::new(Arc::new(clock));
//!
//! let msg = parser.parse(b"<34>Jan 15 12:00:00 myhost sshd: Failed password", "10.0.0.1:514");
//! assert_eq!(msg.facility, 4);
//! assert_eq!(msg.severity, 2);
//! assert_eq!(msg.hostname, "myhost");
//! assert_eq!(msg.tag, "sshd:");
//! assert_eq!(msg.message, "Failed password");
//! ```

pub mod rfc3164;
pub mod rfc5424;
pub mod timestamp;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sysrelay_core::pipeline::{Clock, SystemClock};
use sysrelay_core::types::{DEFAULT_FACILITY, DEFAULT_SEVERITY, ParsedMessage};

/// 유효한 최대 PRI 값 (facility 23 * 8 + severity 7)
pub const MAX_PRI: u16 = 191;

/// structured 문법 표식 (VERSION `1` + 공백)
const STRUCTURED_MARKER: &str = "1 ";

/// 선택된 문법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// PRI가 없거나 잘못되어 문법을 고르지 못함
    Unknown,
    /// RFC 3164 스타일
    Legacy,
    /// RFC 5424 스타일
    Structured,
}

impl Grammar {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Legacy => "legacy",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파싱이 멈춘 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// PRI 없음, 범위 밖, 숫자 아님
    Pri,
    /// 타임스탬프 토큰 없음 또는 해석 실패
    Timestamp,
    /// 호스트명/태그 분리 실패
    Header,
}

impl ParseStage {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pri => "pri",
            Self::Timestamp => "timestamp",
            Self::Header => "header",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파싱 진행 결과 (로그/메트릭용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOutcome {
    /// 선택된 문법
    pub grammar: Grammar,
    /// 본문까지 도달하지 못했다면 멈춘 단계
    pub stopped_at: Option<ParseStage>,
}

impl ParseOutcome {
    /// 본문 분리 전에 멈췄는지 여부
    pub fn is_degraded(&self) -> bool {
        self.stopped_at.is_some()
    }
}

/// 문법별 파서가 채워 나가는 필드
///
/// 타임스탬프는 끝까지 비어 있을 때만 시계 값으로 채워집니다.
#[derive(Debug)]
pub(crate) struct Fields {
    pub(crate) version: u8,
    pub(crate) facility: u8,
    pub(crate) severity: u8,
    pub(crate) timestamp: Option<DateTime<FixedOffset>>,
    pub(crate) hostname: String,
    pub(crate) tag: String,
    pub(crate) structured_data: String,
}

impl Fields {
    fn new(source: &str) -> Self {
        Self {
            version: 0,
            facility: DEFAULT_FACILITY,
            severity: DEFAULT_SEVERITY,
            timestamp: None,
            // 릴레이는 호스트명이 없으면 송신측 주소로 채움
            hostname: source.to_owned(),
            tag: String::new(),
            structured_data: String::new(),
        }
    }
}

/// syslog 메시지 파서
///
/// 주입된 [`Clock`]은 메시지에서 타임스탬프를 얻지 못했을 때만 한 번 호출됩니다.
/// 상태가 없으므로 `Clone` 후 여러 태스크에서 공유할 수 있습니다.
#[derive(Clone)]
pub struct MessageParser {
    clock: Arc<dyn Clock>,
}

impl MessageParser {
    /// 주어진 시계로 파서를 생성합니다.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 원시 바이트를 파싱합니다. UTF-8이 아닌 바이트는 U+FFFD로 치환됩니다.
    pub fn parse(&self, raw: &[u8], source: &str) -> ParsedMessage {
        self.parse_with_outcome(raw, source).0
    }

    /// 파싱 결과와 함께 어느 단계까지 진행했는지 반환합니다.
    pub fn parse_with_outcome(&self, raw: &[u8], source: &str) -> (ParsedMessage, ParseOutcome) {
        let input = String::from_utf8_lossy(raw);
        parse_str_with_outcome(&input, source, self.clock.as_ref())
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl fmt::Debug for MessageParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageParser").finish_non_exhaustive()
    }
}

/// 이미 디코딩된 문자열을 파싱합니다.
pub fn parse_str(input: &str, source: &str, clock: &dyn Clock) -> ParsedMessage {
    parse_str_with_outcome(input, source, clock).0
}

/// 이미 디코딩된 문자열을 파싱하고 진행 결과를 함께 반환합니다.
pub fn parse_str_with_outcome(
    input: &str,
    source: &str,
    clock: &dyn Clock,
) -> (ParsedMessage, ParseOutcome) {
    let mut fields = Fields::new(source);

    let (message, outcome) = match split_pri(input) {
        None => (
            input,
            ParseOutcome {
                grammar: Grammar::Unknown,
                stopped_at: Some(ParseStage::Pri),
            },
        ),
        Some((pri, rest)) => {
            fields.facility = (pri >> 3) as u8;
            fields.severity = (pri & 7) as u8;

            if let Some(body) = rest.strip_prefix(STRUCTURED_MARKER) {
                fields.version = 1;
                fields.hostname.clear();
                let (message, stopped_at) = rfc5424::parse_body(body, &mut fields);
                (
                    message,
                    ParseOutcome {
                        grammar: Grammar::Structured,
                        stopped_at,
                    },
                )
            } else {
                let (message, stopped_at) = rfc3164::parse_body(rest, &mut fields);
                (
                    message,
                    ParseOutcome {
                        grammar: Grammar::Legacy,
                        stopped_at,
                    },
                )
            }
        }
    };

    let timestamp = fields
        .timestamp
        .unwrap_or_else(|| clock.now().fixed_offset());

    let msg = ParsedMessage {
        version: fields.version,
        facility: fields.facility,
        severity: fields.severity,
        timestamp,
        hostname: fields.hostname,
        tag: fields.tag,
        structured_data: fields.structured_data,
        message: message.to_owned(),
        source: source.to_owned(),
    };

    (msg, outcome)
}

/// `<NNN>` 접두사를 분리합니다.
///
/// 첫 번째 `>`가 바이트 인덱스 2..=4에 있어야 하고(숫자 1-3자리),
/// 값이 [`MAX_PRI`] 이하여야 합니다.
fn split_pri(input: &str) -> Option<(u16, &str)> {
    if !input.starts_with('<') {
        return None;
    }

    let end = input.find('>')?;
    if !(2..=4).contains(&end) {
        return None;
    }

    let digits = &input[1..end];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let pri: u16 = digits.parse().ok()?;
    if pri > MAX_PRI {
        return None;
    }

    Some((pri, &input[end + 1..]))
}
