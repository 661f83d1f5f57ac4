//! Lateness classification for present records.

use chrono::NaiveTime;

/// Arrivals up to this many minutes late count as `lateWithin5`.
pub const LATE_THRESHOLD_MINUTES: i64 = 5;

/// How a `lateEntry` clock value is turned into minutes late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatenessPolicy {
    /// Minutes-of-hour of the `HH:mm` value ("08:07" is 7 minutes late).
    /// Only correct when the school day starts exactly on the hour; kept as the
    /// default for compatibility with existing dashboards and stored data.
    #[default]
    MinuteOfHour,
    /// Minutes elapsed since the configured start of the school day.
    /// Arrivals at or before the start time are not late.
    SinceStart(NaiveTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lateness {
    Within5,
    After5,
}

impl LatenessPolicy {
    /// Minutes late for a raw `HH:mm` value, `None` when it cannot be read.
    /// Under [`LatenessPolicy::SinceStart`] early arrivals are negative.
    pub fn minutes_late(&self, late_entry: &str) -> Option<i64> {
        match self {
            LatenessPolicy::MinuteOfHour => {
                let (_, minutes) = late_entry.trim().split_once(':')?;
                minutes.parse::<i64>().ok()
            }
            LatenessPolicy::SinceStart(start) => {
                let arrival = NaiveTime::parse_from_str(late_entry.trim(), "%H:%M").ok()?;
                Some((arrival - *start).num_minutes())
            }
        }
    }

    /// Absent records and records without a `lateEntry` are never late.
    pub fn classify(&self, present: bool, late_entry: Option<&str>) -> Option<Lateness> {
        if !present {
            return None;
        }
        let late_entry = late_entry.filter(|v| !v.trim().is_empty())?;
        let minutes = match self.minutes_late(late_entry) {
            Some(minutes) => minutes,
            None => {
                tracing::warn!(late_entry, "Ignoring unreadable lateEntry value");
                return None;
            }
        };

        if matches!(self, LatenessPolicy::SinceStart(_)) && minutes <= 0 {
            return None;
        }
        if minutes <= LATE_THRESHOLD_MINUTES {
            Some(Lateness::Within5)
        } else {
            Some(Lateness::After5)
        }
    }
}
