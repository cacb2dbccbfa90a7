//! structured(RFC 5424 스타일) 문법
//!
//! ```text
//! <PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID [SD-ELEMENT] MSG
//! ```
//!
//! 호출 시점에는 PRI와 `1 `이 이미 소비되어 있습니다.
//! structured data는 첫 번째 요소만 원문 그대로 잘라 둡니다.

use super::timestamp::parse_rfc3339;
use super::{Fields, ParseStage};

/// HOSTNAME, APP-NAME, PROCID, MSGID, 나머지
const HEADER_PARTS: usize = 5;

/// 타임스탬프 이후 본문을 파싱하고 `message`가 될 나머지를 반환합니다.
pub(crate) fn parse_body<'a>(body: &'a str, fields: &mut Fields) -> (&'a str, Option<ParseStage>) {
    let Some((token, after)) = body.split_once(' ') else {
        return (body, Some(ParseStage::Timestamp));
    };

    // `-`(NILVALUE)도 여기서 실패로 처리
    let Some(timestamp) = parse_rfc3339(token) else {
        return (body, Some(ParseStage::Timestamp));
    };
    fields.timestamp = Some(timestamp);

    let parts: Vec<&str> = after.splitn(HEADER_PARTS, ' ').collect();
    if parts.len() != HEADER_PARTS {
        return (after, Some(ParseStage::Header));
    }

    fields.hostname = parts[0].to_owned();
    fields.tag = parts[1..4].join(" ");

    (take_structured_data(parts[4], fields), None)
}

/// `[`로 시작하면 첫 `]` 직전까지를 structured data로 잘라냅니다.
///
/// `]` 다음 공백 하나는 구분자로 건너뜁니다. 공백이 없거나 버퍼 끝이면
/// 바로 뒤부터 메시지입니다.
fn take_structured_data<'a>(rest: &'a str, fields: &mut Fields) -> &'a str {
    if !rest.starts_with('[') {
        return rest;
    }

    match rest.find(']') {
        Some(end) if end > 1 => {
            fields.structured_data = rest[..end].to_owned();
            let after = &rest[end + 1..];
            after.strip_prefix(' ').unwrap_or(after)
        }
        _ => rest,
    }
}
