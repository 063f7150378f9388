//! Timestamp helpers.
//!
//! All persisted timestamps carry microsecond precision so a value read back
//! from any backend compares equal to the value that was written.

use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC time truncated to microseconds.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Start of the UTC day containing `at`.
#[must_use]
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn now_has_micro_precision() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }

    #[test]
    fn start_of_day_truncates() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(start_of_day(at), Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    }
}
