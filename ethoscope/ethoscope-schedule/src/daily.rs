use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::{Error, Result};

const DAY_SECONDS: i64 = 24 * 3600;

/// A window of `daily_duration_hours` opening every `interval_hours`.
///
/// Periods are anchored to `daily_start_time` each calendar day. An
/// interval that does not divide 24 hours is cut short at the next day's
/// start time.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyScheduler {
    duration: TimeDelta,
    interval: TimeDelta,
    start_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleInfo {
    pub daily_duration_hours: f64,
    pub interval_hours: f64,
    pub daily_start_time: String,
    pub currently_active: bool,
    pub remaining_active_seconds: f64,
    pub seconds_until_next_period: f64,
    pub next_period_start: NaiveDateTime,
}

impl DailyScheduler {
    pub fn new(
        daily_duration_hours: f64,
        interval_hours: f64,
        daily_start_time: &str,
    ) -> Result<Self> {
        let valid = daily_duration_hours > 0.0
            && daily_duration_hours <= interval_hours
            && interval_hours <= 24.0;
        if !valid {
            return Err(Error::BadPeriod {
                duration_hours: daily_duration_hours,
                interval_hours,
            });
        }
        let start_time = NaiveTime::parse_from_str(daily_start_time.trim(), "%H:%M:%S")
            .map_err(|_| Error::BadTimeOfDay(daily_start_time.to_string()))?;
        let to_delta = |hours: f64| TimeDelta::milliseconds((hours * 3_600_000.0).round() as i64);
        let sched = Self {
            duration: to_delta(daily_duration_hours),
            interval: to_delta(interval_hours),
            start_time,
        };
        // Periods are counted in whole milliseconds.
        if sched.duration < TimeDelta::milliseconds(1) {
            return Err(Error::BadPeriod {
                duration_hours: daily_duration_hours,
                interval_hours,
            });
        }
        tracing::info!(
            "daily schedule: {daily_duration_hours}h active every {interval_hours}h from {start_time}"
        );
        Ok(sched)
    }

    /// Start of the day's first period on or before `t`.
    fn anchor(&self, t: NaiveDateTime) -> NaiveDateTime {
        let today = t.date().and_time(self.start_time);
        if t >= today {
            today
        } else {
            today - TimeDelta::seconds(DAY_SECONDS)
        }
    }

    /// Index of the period containing `t`, counted from the day's anchor.
    pub fn period_index(&self, t: NaiveDateTime) -> i64 {
        let since = (t - self.anchor(t)).num_milliseconds();
        since.div_euclid(self.interval.num_milliseconds())
    }

    fn current_period_start(&self, t: NaiveDateTime) -> NaiveDateTime {
        self.anchor(t) + self.interval * self.period_index(t) as i32
    }

    pub fn is_active_period(&self, t: NaiveDateTime) -> bool {
        let start = self.current_period_start(t);
        start <= t && t < start + self.duration
    }

    /// Start of the first period beginning strictly after `t`.
    pub fn next_period_start(&self, t: NaiveDateTime) -> NaiveDateTime {
        let candidate = self.current_period_start(t) + self.interval;
        let next_anchor = self.anchor(t) + TimeDelta::seconds(DAY_SECONDS);
        candidate.min(next_anchor)
    }

    pub fn seconds_until_next_period(&self, t: NaiveDateTime) -> f64 {
        let dt = self.next_period_start(t) - t;
        (dt.num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    /// Zero when outside an active period.
    pub fn remaining_active_seconds(&self, t: NaiveDateTime) -> f64 {
        if !self.is_active_period(t) {
            return 0.0;
        }
        let next_anchor = self.anchor(t) + TimeDelta::seconds(DAY_SECONDS);
        let end = (self.current_period_start(t) + self.duration).min(next_anchor);
        ((end - t).num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    pub fn info(&self, t: NaiveDateTime) -> ScheduleInfo {
        ScheduleInfo {
            daily_duration_hours: self.duration.num_milliseconds() as f64 / 3_600_000.0,
            interval_hours: self.interval.num_milliseconds() as f64 / 3_600_000.0,
            daily_start_time: self.start_time.format("%H:%M:%S").to_string(),
            currently_active: self.is_active_period(t),
            remaining_active_seconds: self.remaining_active_seconds(t),
            seconds_until_next_period: self.seconds_until_next_period(t),
            next_period_start: self.next_period_start(t),
        }
    }
}
