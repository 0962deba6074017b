use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

/// Offset of Indian Standard Time from UTC, in seconds (+05:30)
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Business calendar handling.
/// Timestamps are stored as UTC; due dates are IST calendar dates.
pub struct TimezoneConverter;

impl TimezoneConverter {
    fn ist() -> FixedOffset {
        FixedOffset::east_opt(IST_OFFSET_SECS).expect("Valid offset")
    }

    /// Convert UTC timestamp to Indian Standard Time
    pub fn utc_to_ist(utc_time: DateTime<Utc>) -> DateTime<FixedOffset> {
        utc_time.with_timezone(&Self::ist())
    }

    /// Calendar date in IST for a UTC instant
    pub fn business_date(utc_time: DateTime<Utc>) -> NaiveDate {
        Self::utc_to_ist(utc_time).date_naive()
    }

    /// Next instant strictly after `now` at `hour`:00 IST
    pub fn next_business_hour(now: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
        let ist = Self::ist();
        let local = Self::utc_to_ist(now);
        let candidate = local.date_naive().and_hms_opt(hour, 0, 0)?;
        let candidate = ist.from_local_datetime(&candidate).single()?;

        let next = if candidate > local {
            candidate
        } else {
            candidate + Duration::days(1)
        };
        Some(next.with_timezone(&Utc))
    }

    /// Format timestamp as ISO 8601 UTC for API responses
    pub fn format_iso8601_utc(utc_time: DateTime<Utc>) -> String {
        utc_time.to_rfc3339()
    }
}
