// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Time windows for stimulation.
//!
//! A [Scheduler] is built from a date-range string such as
//! `"2015-10-04 00:00:00 > 2015-10-05 00:00:00, 2015-10-07 00:00:00 >"`.
//! A [DailyScheduler] describes a window recurring every few hours.
//!
//! Timestamps are local wall-clock times without a zone, matching how the
//! ranges are typed in by the operator.

mod daily;
mod scheduler;

pub use daily::{DailyScheduler, ScheduleInfo};
pub use scheduler::{Boundary, Scheduler, Window};

/// Errors in a schedule definition. All of them are fatal at load time.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("segment \"{0}\" contains more than one '>'")]
    TooManySeparators(String),
    #[error("segment \"{0}\" has neither a start nor an end")]
    UnboundedSegment(String),
    #[error("\"{0}\" is not a date of the form YYYY-MM-DD HH:MM:SS")]
    BadDate(String),
    #[error("segment \"{0}\" does not start before it ends")]
    EmptySegment(String),
    #[error("date ranges overlap in \"{0}\"")]
    Overlap(String),
    #[error("daily schedule duration {duration_hours}h and interval {interval_hours}h must satisfy 1 ms <= duration <= interval <= 24h")]
    BadPeriod {
        duration_hours: f64,
        interval_hours: f64,
    },
    #[error("\"{0}\" is not a time of the form HH:MM:SS")]
    BadTimeOfDay(String),
}

pub type Result<T> = std::result::Result<T, Error>;
