use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Local hour at which a business day starts (and the previous one ends).
pub const OPERATIVE_DAY_START_HOUR: i64 = 6;

/// Valid UTC offsets, in minutes (UTC-12:00 ..= UTC+14:00).
pub const MIN_UTC_OFFSET_MINUTES: i32 = -720;
pub const MAX_UTC_OFFSET_MINUTES: i32 = 840;

/// Builds a fixed offset from minutes east of UTC, falling back to UTC when
/// the value is out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes) {
        log::warn!("Ignoring out of range UTC offset {minutes}, using UTC");
        return Utc.fix();
    }

    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Business day a timestamp belongs to. Anything before 06:00 local time is
/// still counted as the previous day.
pub fn operative_day(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let local = timestamp.with_timezone(&offset).naive_local();
    (local - Duration::hours(OPERATIVE_DAY_START_HOUR)).date()
}

/// `[start, end)` instants in UTC covering the given business day.
pub fn operative_window(day: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_start = day.and_time(NaiveTime::MIN) + Duration::hours(OPERATIVE_DAY_START_HOUR);
    let utc_start = local_start - Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = Utc.from_utc_datetime(&utc_start);
    (start, start + Duration::days(1))
}

/// Window covering the last `days` business days, today included.
pub fn trailing_window(
    now: DateTime<Utc>,
    days: u32,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = operative_day(now, offset);
    let first_day = today - Duration::days(i64::from(days.max(1)) - 1);
    let (start, _) = operative_window(first_day, offset);
    let (_, end) = operative_window(today, offset);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mexico_city() -> FixedOffset {
        offset_from_minutes(-360)
    }

    fn utc(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn late_night_counts_as_previous_day() {
        // 02:30 local on March 2nd
        let ts = utc("2025-03-02T08:30:00Z");
        assert_eq!(
            operative_day(ts, mexico_city()),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn six_am_starts_a_new_day() {
        let ts = utc("2025-03-02T12:00:00Z");
        assert_eq!(
            operative_day(ts, mexico_city()),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );

        let just_before = utc("2025-03-02T11:59:59Z");
        assert_eq!(
            operative_day(just_before, mexico_city()),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn window_spans_six_to_six_local() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let (start, end) = operative_window(day, mexico_city());
        assert_eq!(start, utc("2025-03-01T12:00:00Z"));
        assert_eq!(end, utc("2025-03-02T12:00:00Z"));
        assert_eq!(operative_day(start, mexico_city()), day);
        assert_eq!(operative_day(end - Duration::seconds(1), mexico_city()), day);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(offset_from_minutes(5000).local_minus_utc(), 0);
        assert_eq!(offset_from_minutes(330).local_minus_utc(), 330 * 60);
    }

    #[test]
    fn trailing_window_covers_requested_days() {
        let now = utc("2025-03-10T18:00:00Z");
        let (start, end) = trailing_window(now, 7, mexico_city());
        assert_eq!(start, utc("2025-03-04T12:00:00Z"));
        assert_eq!(end, utc("2025-03-11T12:00:00Z"));

        let (single_start, single_end) = trailing_window(now, 0, mexico_city());
        assert_eq!(single_end - single_start, Duration::days(1));
    }
}
