use std::{str::FromStr, sync::LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("static date pattern")
});

/// One end of a window. Variant order gives `NegInf < At(_) < PosInf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Boundary {
    NegInf,
    At(NaiveDateTime),
    PosInf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Boundary,
    pub end: Boundary,
}

impl Window {
    /// Exclusive at both ends.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        let t = Boundary::At(t);
        self.start < t && t < self.end
    }
}

/// A sorted, non-overlapping set of time windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    windows: Vec<Window>,
}

impl Default for Scheduler {
    /// Always in range.
    fn default() -> Self {
        Self {
            windows: vec![Window {
                start: Boundary::NegInf,
                end: Boundary::PosInf,
            }],
        }
    }
}

impl FromStr for Scheduler {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Scheduler {
    /// Parse a comma separated list of `start > end` segments.
    ///
    /// A blank string, or a segment without `>`, that is blank, means the
    /// scheduler is always in range.
    pub fn parse(date_range: &str) -> Result<Self> {
        let mut windows = Vec::new();
        for segment in date_range.split(',') {
            windows.push(parse_segment(segment)?);
        }
        windows.sort_by_key(|w| w.start);

        let mut previous: Option<Boundary> = None;
        for w in &windows {
            for b in [w.start, w.end] {
                if let Some(p) = previous {
                    if b <= p {
                        return Err(Error::Overlap(date_range.to_string()));
                    }
                }
                previous = Some(b);
            }
        }
        tracing::debug!("parsed date range {date_range:?} into {} window(s)", windows.len());
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn is_always(&self) -> bool {
        self.windows.len() == 1
            && self.windows[0].start == Boundary::NegInf
            && self.windows[0].end == Boundary::PosInf
    }

    /// True iff `t` is strictly inside one of the windows.
    pub fn in_range(&self, t: NaiveDateTime) -> bool {
        self.windows.iter().any(|w| w.contains(t))
    }

    /// [Self::in_range] at the current local time.
    pub fn check_time_range(&self) -> bool {
        self.in_range(chrono::Local::now().naive_local())
    }
}

fn parse_segment(segment: &str) -> Result<Window> {
    let parts: Vec<&str> = segment.split('>').collect();
    match parts.as_slice() {
        [single] => {
            if single.trim().is_empty() {
                Ok(Window {
                    start: Boundary::NegInf,
                    end: Boundary::PosInf,
                })
            } else {
                // a lone date has no direction
                Err(Error::BadDate(single.trim().to_string()))
            }
        }
        [start, end] => {
            let start = parse_boundary(start, Boundary::NegInf)?;
            let end = parse_boundary(end, Boundary::PosInf)?;
            if start == Boundary::NegInf && end == Boundary::PosInf {
                return Err(Error::UnboundedSegment(segment.trim().to_string()));
            }
            if start >= end {
                return Err(Error::EmptySegment(segment.trim().to_string()));
            }
            Ok(Window { start, end })
        }
        _ => Err(Error::TooManySeparators(segment.trim().to_string())),
    }
}

fn parse_boundary(s: &str, blank: Boundary) -> Result<Boundary> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(blank);
    }
    if !DATE_RE.is_match(s) {
        return Err(Error::BadDate(s.to_string()));
    }
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map(Boundary::At)
        .map_err(|_| Error::BadDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn blank_is_always() {
        let s = Scheduler::parse("").unwrap();
        assert!(s.is_always());
        assert!(s.in_range(t("1999-01-01 00:00:00")));
        assert_eq!(s, Scheduler::default());
    }

    #[test]
    fn open_ended_segments() {
        let s: Scheduler = " > 2020-01-01 00:00:00".parse().unwrap();
        assert!(s.in_range(t("2019-12-31 23:59:59")));
        assert!(!s.in_range(t("2020-01-01 00:00:00")));

        let s: Scheduler = "2020-01-01 00:00:00 >".parse().unwrap();
        assert!(!s.in_range(t("2020-01-01 00:00:00")));
        assert!(s.in_range(t("2031-01-01 00:00:00")));
    }

    #[test]
    fn bounds_are_exclusive() {
        let s = Scheduler::parse("2015-10-04 00:00:00 > 2015-10-05 00:00:00").unwrap();
        assert!(!s.in_range(t("2015-10-04 00:00:00")));
        assert!(!s.in_range(t("2015-10-05 00:00:00")));
        assert!(s.in_range(t("2015-10-04 12:00:00")));
    }

    #[test]
    fn malformed_dates() {
        assert!(matches!(
            Scheduler::parse("2015-1-04 00:00:00 > 2015-10-05 00:00:00"),
            Err(Error::BadDate(_))
        ));
        assert!(matches!(
            Scheduler::parse("2015-10-04 00:00:00"),
            Err(Error::BadDate(_))
        ));
        assert!(matches!(
            Scheduler::parse("2015-13-04 00:00:00 >"),
            Err(Error::BadDate(_))
        ));
    }
}
