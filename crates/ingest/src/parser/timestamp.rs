//! 타임스탬프 해석

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};

/// legacy 타임스탬프 길이 (`Mmm dd hh:mm:ss`)
pub const LEGACY_TIMESTAMP_LEN: usize = 15;

/// RFC 3339 타임스탬프를 해석합니다. 소수 초는 있어도 없어도 됩니다.
///
/// 예: `2015-12-15T11:54:41.946675-08:00`, `2024-01-15T12:00:00Z`
///
/// 구분자 `T`와 `Z`는 대문자만 허용하며, 윤초(`:60`)는 거부합니다.
pub fn parse_rfc3339(token: &str) -> Option<DateTime<FixedOffset>> {
    if token.contains(['t', 'z']) {
        return None;
    }
    DateTime::parse_from_rfc3339(token)
        .ok()
        .filter(|ts| !is_leap_second(ts))
}

/// legacy `Mmm _d hh:mm:ss` 타임스탬프를 해석합니다.
///
/// 연도 정보가 없으므로 0년, UTC로 고정합니다. 현재 연도를 추정하지 않아야
/// 같은 입력이 항상 같은 결과를 냅니다.
pub fn parse_legacy(stamp: &str) -> Option<DateTime<FixedOffset>> {
    let with_year = format!("0000 {stamp}");
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %e %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
        .filter(|ts| !is_leap_second(ts))
}

/// chrono는 윤초를 1초 이상의 나노초로 표현함
fn is_leap_second(ts: &DateTime<FixedOffset>) -> bool {
    ts.nanosecond() >= 1_000_000_000
}
