//! Time helpers for the marketplace timezone
//!
//! The marketplace speaks ISO-8601 with millisecond precision and a fixed
//! `+09:00` offset. Everything stored locally is Unix millis.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Marketplace business timezone (UTC+9, no DST)
pub fn marketplace_offset() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `2024-05-01T10:00:00.123+09:00`
pub fn to_marketplace_iso(at: DateTime<Utc>) -> String {
    at.with_timezone(&marketplace_offset())
        .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        .to_string()
}

/// Collection window `[now - hours, now]` as marketplace timestamps
pub fn collection_window(now: DateTime<Utc>, hours: i64) -> (String, String) {
    let from = now - Duration::hours(hours);
    (to_marketplace_iso(from), to_marketplace_iso(now))
}
