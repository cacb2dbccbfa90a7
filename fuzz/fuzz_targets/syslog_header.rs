#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use sysrelay_core::pipeline::FixedClock;
use sysrelay_ingest::parser::MessageParser;

/// 그럴듯한 헤더를 가진 입력 (PRI + 문법 선택 + 나머지)
#[derive(Debug, Arbitrary)]
struct Input {
    pri: u8,
    structured: bool,
    rest: String,
}

fuzz_target!(|input: Input| {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
    let parser = MessageParser::new(Arc::new(clock));

    let pri = input.pri % 192;
    let marker = if input.structured { "1 " } else { "" };
    let raw = format!("<{}>{}{}", pri, marker, input.rest);

    let (msg, outcome) = parser.parse_with_outcome(raw.as_bytes(), "fuzz:514");

    // PRI는 항상 복원되어야 한다
    assert_eq!(msg.facility * 8 + msg.severity, pri);
    if input.structured {
        assert_eq!(msg.version, 1);
    }
    let _ = outcome.is_degraded();
});
