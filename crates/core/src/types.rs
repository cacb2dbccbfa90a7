//! 도메인 타입 — 파싱된 syslog 메시지와 싱크 전달 형식
//!
//! [`ParsedMessage`]는 파서가 입력 단위(데이터그램 또는 스트림 연결) 하나당
//! 하나씩 생성하는 결과입니다. 파싱이 끝나면 변경되지 않으며,
//! [`SinkEntry`]로 변환되어 싱크에 정확히 한 번 전달됩니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// PRI가 없거나 잘못된 경우의 기본 severity (notice)
pub const DEFAULT_SEVERITY: u8 = 5;

/// PRI가 없거나 잘못된 경우의 기본 facility (kernel)
pub const DEFAULT_FACILITY: u8 = 0;

/// 싱크 속성 키 — 프로토콜 버전
pub const ATTR_VERSION: &str = "SYSLOG_VERSION";
/// 싱크 속성 키 — facility
pub const ATTR_FACILITY: &str = "SYSLOG_FACILITY";
/// 싱크 속성 키 — severity
pub const ATTR_SEVERITY: &str = "SYSLOG_SEVERITY";
/// 싱크 속성 키 — 호스트명 + 태그 복합 식별자
pub const ATTR_IDENTIFIER: &str = "SYSLOG_IDENTIFIER";
/// 싱크 속성 키 — 타임스탬프 (RFC 3339)
pub const ATTR_TIMESTAMP: &str = "SYSLOG_TIMESTAMP";
/// 싱크 속성 키 — 호스트명
pub const ATTR_HOSTNAME: &str = "SYSLOG_HOSTNAME";
/// 싱크 속성 키 — 송신측 주소
pub const ATTR_SOURCE: &str = "SYSLOG_SOURCE";
/// 싱크 속성 키 — structured data 원문
pub const ATTR_STRUCTURED_DATA: &str = "SYSLOG_STRUCTURED_DATA";

/// 파싱된 syslog 메시지
///
/// 모든 필드는 파싱 도중 단조적으로만 채워집니다. 뒤 단계가 실패해도
/// 앞에서 설정된 값은 되돌리지 않고, 소비되지 않은 나머지가 `message`가 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// 프로토콜 버전 (0: legacy, 1: structured)
    pub version: u8,
    /// facility (0-23)
    pub facility: u8,
    /// severity (0-7)
    pub severity: u8,
    /// 메시지 타임스탬프. 파싱하지 못하면 수신 시각 (주입된 clock 값)
    pub timestamp: DateTime<FixedOffset>,
    /// 호스트명
    pub hostname: String,
    /// 태그 (legacy: `APP:` 토큰, structured: `APP-NAME PROCID MSGID`)
    pub tag: String,
    /// 첫 번째 structured data 요소 원문 (`[` 포함, `]` 제외)
    pub structured_data: String,
    /// 소비되지 않은 나머지 본문
    pub message: String,
    /// 송신측 주소 문자열
    pub source: String,
}

impl ParsedMessage {
    /// PRI 값을 복원합니다 (`facility * 8 + severity`).
    pub fn pri(&self) -> u16 {
        (u16::from(self.facility) << 3) | u16::from(self.severity)
    }

    /// 호스트명과 태그를 공백으로 이은 식별자를 반환합니다.
    ///
    /// 태그만으로는 완전한 식별자가 되지 않으므로 호스트명을 앞에 붙입니다.
    pub fn identifier(&self) -> String {
        format!("{} {}", self.hostname, self.tag)
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}>{} {} {}: {}",
            self.pri(),
            self.version,
            self.source,
            self.identifier(),
            self.message,
        )
    }
}

/// 싱크로 전달되는 레코드
///
/// 자유 텍스트 본문, 숫자 우선순위(severity), 이름 붙은 문자열 속성 맵으로 구성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkEntry {
    /// 본문
    pub message: String,
    /// 우선순위 (0-7, severity와 동일)
    pub priority: u8,
    /// 속성 맵 (`SYSLOG_*` 키)
    pub attributes: BTreeMap<String, String>,
}

impl From<&ParsedMessage> for SinkEntry {
    fn from(msg: &ParsedMessage) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_VERSION.to_owned(), msg.version.to_string());
        attributes.insert(ATTR_FACILITY.to_owned(), msg.facility.to_string());
        attributes.insert(ATTR_SEVERITY.to_owned(), msg.severity.to_string());
        attributes.insert(ATTR_IDENTIFIER.to_owned(), msg.identifier());

        let timestamp = msg
            .timestamp
            .to_rfc3339_opts(SecondsFormat::AutoSi, false);
        insert_non_empty(&mut attributes, ATTR_TIMESTAMP, timestamp);
        insert_non_empty(&mut attributes, ATTR_HOSTNAME, msg.hostname.clone());
        insert_non_empty(&mut attributes, ATTR_SOURCE, msg.source.clone());
        insert_non_empty(
            &mut attributes,
            ATTR_STRUCTURED_DATA,
            msg.structured_data.clone(),
        );

        Self {
            message: msg.message.clone(),
            priority: msg.severity,
            attributes,
        }
    }
}

impl From<ParsedMessage> for SinkEntry {
    fn from(msg: ParsedMessage) -> Self {
        Self::from(&msg)
    }
}

fn insert_non_empty(map: &mut BTreeMap<String, String>, key: &str, value: String) {
    if !value.is_empty() {
        map.insert(key.to_owned(), value);
    }
}
