//! Rolling window boundary arithmetic.
//!
//! Counters live in hashes that expire at the end of their window, so a
//! window "resets" by disappearing. All boundaries are computed in the local
//! civil calendar: day windows end at the next midnight, week windows at the
//! next Monday midnight, month windows at midnight on the first of the next
//! month.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Rolling counter window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Day,
    Week,
    Month,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] = [WindowKind::Day, WindowKind::Week, WindowKind::Month];

    /// Key segment for the window's counter hash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// Returns the civil instant at which the window containing `now` ends.
///
/// Pure function of its inputs; callers pass the wall clock they want the
/// window anchored to.
pub fn window_boundary(now: NaiveDateTime, window: WindowKind) -> NaiveDateTime {
    match window {
        WindowKind::Day => (now.date() + Duration::days(1)).and_time(NaiveTime::MIN),
        WindowKind::Week => {
            let days_ahead = 7 - i64::from(now.date().weekday().num_days_from_monday());
            (now.date() + Duration::days(days_ahead)).and_time(NaiveTime::MIN)
        }
        WindowKind::Month => {
            let (year, month) = if now.month() == 12 {
                (now.year() + 1, 1)
            } else {
                (now.year(), now.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .expect("first of month is a valid date")
                .and_time(NaiveTime::MIN)
        }
    }
}

/// Unix timestamp of the window boundary in the caller's timezone. A local
/// midnight skipped by a DST transition falls back to the UTC reading.
pub fn window_expire_at<Tz: TimeZone>(now: &DateTime<Tz>, window: WindowKind) -> i64 {
    let boundary = window_boundary(now.naive_local(), window);
    now.timezone()
        .from_local_datetime(&boundary)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| boundary.and_utc().timestamp())
}
