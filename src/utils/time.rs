//! Japan Standard Time helpers.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

const JST_OFFSET_SECS: i32 = 9 * 3600;

/// The fixed UTC+9 offset.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in JST.
pub fn now_jst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// Current calendar date in JST.
pub fn today_jst() -> NaiveDate {
    now_jst().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_jst_date_boundary() {
        // 2025-05-31T15:30Z is already June 1st in Tokyo
        let utc = Utc.with_ymd_and_hms(2025, 5, 31, 15, 30, 0).unwrap();
        let local = utc.with_timezone(&jst());
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(local.to_rfc3339(), "2025-06-01T00:30:00+09:00");
    }
}
