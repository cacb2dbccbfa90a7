#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use sysrelay_core::pipeline::FixedClock;
use sysrelay_core::types::SinkEntry;
use sysrelay_ingest::parser::parse_str;

fuzz_target!(|data: &[u8]| {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
    let input = String::from_utf8_lossy(data);

    // 어떤 입력에도 패닉 없이 메시지를 돌려줘야 한다
    let msg = parse_str(&input, "fuzz:514", &clock);
    assert!(msg.facility <= 23);
    assert!(msg.severity <= 7);

    let _ = SinkEntry::from(&msg);
});
