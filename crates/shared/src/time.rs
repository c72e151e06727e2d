//! Local-time helpers.
//!
//! Installations are scheduled in Colombia local time (UTC-5, no DST). The
//! backend sends naive dates and times, so the technician's "today" must be
//! computed in that zone regardless of where the device clock is set.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// Offset of America/Bogota from UTC, in seconds west.
const COLOMBIA_UTC_OFFSET_WEST_SECS: i32 = 5 * 3600;

/// Returns the fixed Colombia offset (UTC-5).
pub fn colombia_offset() -> FixedOffset {
    match FixedOffset::west_opt(COLOMBIA_UTC_OFFSET_WEST_SECS) {
        Some(offset) => offset,
        None => Utc.fix(),
    }
}

/// Converts a UTC instant into Colombia local time.
pub fn to_colombia(dt: DateTime<Utc>) -> DateTime<FixedOffset> {
    dt.with_timezone(&colombia_offset())
}

/// Current date in Colombia.
pub fn today_colombia() -> NaiveDate {
    to_colombia(Utc::now()).date_naive()
}

/// Parses a wall-clock schedule time as sent by the backend.
///
/// Accepts `HH:MM:SS` and `HH:MM`. Returns `None` for anything else.
pub fn parse_schedule_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_colombia_offset_is_utc_minus_five() {
        assert_eq!(colombia_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_to_colombia_shifts_five_hours() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 3, 30, 0).unwrap();
        let local = to_colombia(utc);
        assert_eq!(local.hour(), 22);
        assert_eq!(
            local.date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_parse_schedule_time_formats() {
        assert_eq!(
            parse_schedule_time("09:00:00"),
            NaiveTime::from_hms_opt(9, 0, 0)
        );
        assert_eq!(
            parse_schedule_time(" 14:30 "),
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(parse_schedule_time("tarde"), None);
        assert_eq!(parse_schedule_time("25:00"), None);
    }
}
