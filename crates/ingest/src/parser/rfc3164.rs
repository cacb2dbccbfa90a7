//! legacy(RFC 3164 스타일) 문법
//!
//! ```text
//! <PRI>Mmm dd hh:mm:ss HOSTNAME TAG MSG
//! ```
//!
//! 태그는 검증하지 않으며(`user:`, `sshd[42]:` 모두 그대로), 공백으로 나눈
//! 첫 두 토큰이 호스트명과 태그, 나머지 전부가 메시지입니다.

use super::timestamp::{LEGACY_TIMESTAMP_LEN, parse_legacy};
use super::{Fields, ParseStage};

/// HOSTNAME, TAG, 나머지
const HEADER_PARTS: usize = 3;

/// PRI 이후 본문을 파싱하고 `message`가 될 나머지를 반환합니다.
pub(crate) fn parse_body<'a>(rest: &'a str, fields: &mut Fields) -> (&'a str, Option<ParseStage>) {
    let Some(stamp) = rest.get(..LEGACY_TIMESTAMP_LEN) else {
        return (rest, Some(ParseStage::Timestamp));
    };

    let Some(timestamp) = parse_legacy(stamp) else {
        return (rest, Some(ParseStage::Timestamp));
    };
    fields.timestamp = Some(timestamp);

    // 타임스탬프 뒤 구분 문자 하나를 건너뜀 (버퍼 끝이면 빈 문자열)
    let mut tail = rest[LEGACY_TIMESTAMP_LEN..].chars();
    tail.next();
    let after = tail.as_str();

    let parts: Vec<&str> = after.splitn(HEADER_PARTS, ' ').collect();
    if parts.len() != HEADER_PARTS {
        return (after, Some(ParseStage::Header));
    }

    fields.hostname = parts[0].to_owned();
    fields.tag = parts[1].to_owned();

    (parts[2], None)
}
