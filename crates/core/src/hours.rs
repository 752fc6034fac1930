//! Business-hours calendar arithmetic.
//!
//! A calendar is a fixed UTC offset (the tenant-local timezone, no DST or
//! holiday handling) plus a set of per-weekday windows. Elapsed time outside
//! the windows does not count toward an SLA deadline.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Offsets beyond UTC±14:00 do not exist on any real clock.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl BusinessDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monday" => Some(Self::Monday),
            "tuesday" => Some(Self::Tuesday),
            "wednesday" => Some(Self::Wednesday),
            "thursday" => Some(Self::Thursday),
            "friday" => Some(Self::Friday),
            "saturday" => Some(Self::Saturday),
            "sunday" => Some(Self::Sunday),
            _ => None,
        }
    }

    fn matches(&self, weekday: Weekday) -> bool {
        matches!(
            (self, weekday),
            (Self::Monday, Weekday::Mon)
                | (Self::Tuesday, Weekday::Tue)
                | (Self::Wednesday, Weekday::Wed)
                | (Self::Thursday, Weekday::Thu)
                | (Self::Friday, Weekday::Fri)
                | (Self::Saturday, Weekday::Sat)
                | (Self::Sunday, Weekday::Sun)
        )
    }
}

/// One contiguous window on one weekday, in tenant-local wall-clock time.
/// Windows never wrap midnight: `start < end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessWindow {
    pub weekday: BusinessDay,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub utc_offset_minutes: i32,
    pub windows: Vec<BusinessWindow>,
}

impl BusinessHours {
    pub fn validate(&self) -> Result<(), String> {
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            ));
        }

        if self.windows.is_empty() {
            return Err("at least one business window is required".to_string());
        }

        for window in &self.windows {
            if window.start >= window.end {
                return Err(format!(
                    "window on {} must start before it ends",
                    window.weekday.as_str()
                ));
            }
        }

        let mut by_day: Vec<&BusinessWindow> = self.windows.iter().collect();
        by_day.sort_by_key(|window| (window.weekday.as_str(), window.start));
        for pair in by_day.windows(2) {
            if pair[0].weekday == pair[1].weekday && pair[1].start < pair[0].end {
                return Err(format!(
                    "overlapping windows on {}",
                    pair[0].weekday.as_str()
                ));
            }
        }

        Ok(())
    }

    /// Whole business minutes elapsed between two instants. Returns zero for
    /// an empty or inverted range.
    pub fn business_minutes_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        if to <= from {
            return 0;
        }

        let clamped =
            self.utc_offset_minutes.clamp(-MAX_UTC_OFFSET_MINUTES, MAX_UTC_OFFSET_MINUTES);
        let Some(offset) = FixedOffset::east_opt(clamped * 60) else {
            return 0;
        };
        let local_from = from.with_timezone(&offset).naive_local();
        let local_to = to.with_timezone(&offset).naive_local();

        let mut total_seconds: i64 = 0;
        let mut date = local_from.date();
        while date <= local_to.date() {
            for window in &self.windows {
                if !window.weekday.matches(date.weekday()) {
                    continue;
                }
                let window_start = date.and_time(window.start);
                let window_end = date.and_time(window.end);
                let overlap_start = window_start.max(local_from);
                let overlap_end = window_end.min(local_to);
                if overlap_end > overlap_start {
                    total_seconds += (overlap_end - overlap_start).num_seconds();
                }
            }
            date += Duration::days(1);
        }

        total_seconds / 60
    }
}
