//! Live-class status evaluation.
//!
//! Everything here is a pure function of a course's schedule and a caller
//! supplied local `now`. Missing schedule data never errors: every query
//! simply answers "not live / no next class".

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::{BitOr, BitOrAssign};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::db::models::CourseType;

/// Set of weekdays on which a class meets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct DaySet(u8);

impl DaySet {
    pub const MONDAY: Self = DaySet(1 << 0);
    pub const TUESDAY: Self = DaySet(1 << 1);
    pub const WEDNESDAY: Self = DaySet(1 << 2);
    pub const THURSDAY: Self = DaySet(1 << 3);
    pub const FRIDAY: Self = DaySet(1 << 4);
    pub const SATURDAY: Self = DaySet(1 << 5);
    pub const SUNDAY: Self = DaySet(1 << 6);

    pub const NONE: Self = DaySet(0);

    /// Calendar order, Monday first. Names are the tokens persisted in `schedule_days`.
    const DAY_NAMES: [(Self, &'static str, &'static str); 7] = [
        (Self::MONDAY, "monday", "Mon"),
        (Self::TUESDAY, "tuesday", "Tue"),
        (Self::WEDNESDAY, "wednesday", "Wed"),
        (Self::THURSDAY, "thursday", "Thu"),
        (Self::FRIDAY, "friday", "Fri"),
        (Self::SATURDAY, "saturday", "Sat"),
        (Self::SUNDAY, "sunday", "Sun"),
    ];

    pub fn from_weekday(day: Weekday) -> Self {
        DaySet(1 << day.num_days_from_monday())
    }

    pub fn contains(self, day: Self) -> bool {
        (self.0 & day.0) == day.0
    }

    pub fn includes(self, date: NaiveDate) -> bool {
        self.contains(Self::from_weekday(date.weekday()))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn lookup(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        Self::DAY_NAMES
            .iter()
            .find(|(_, name, short)| *name == token || short.to_lowercase() == token)
            .map(|(day, _, _)| *day)
    }

    /// Strict parse used when staff submit a schedule; unknown tokens are rejected.
    pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut result = Self::NONE;
        for name in names {
            match Self::lookup(name.as_ref()) {
                Some(day) => result |= day,
                None => return Err(name.as_ref().to_string()),
            }
        }
        Ok(result)
    }

    /// Lenient parse of the stored JSON array; anything unrecognised is skipped.
    pub fn from_json_lossy(raw: &str) -> Self {
        let names: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
        names
            .iter()
            .filter_map(|n| Self::lookup(n))
            .fold(Self::NONE, |acc, day| acc | day)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::DAY_NAMES
            .iter()
            .filter(|(day, _, _)| self.contains(*day))
            .map(|(_, name, _)| *name)
            .collect()
    }

    pub fn to_json(self) -> String {
        serde_json::to_string(&self.names()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Display for DaySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let short: Vec<&str> = Self::DAY_NAMES
            .iter()
            .filter(|(day, _, _)| self.contains(*day))
            .map(|(_, _, short)| *short)
            .collect();
        write!(f, "{}", short.join(", "))
    }
}

impl BitOr for DaySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        DaySet(self.0 | rhs.0)
    }
}

impl BitOrAssign for DaySet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Serialize for DaySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    LiveNow,
    StartingSoon,
    Scheduled,
    Recorded,
}

/// The schedule-relevant slice of a course.
#[derive(Debug, Clone, Copy)]
pub struct ClassSchedule {
    pub course_type: CourseType,
    pub days: DaySet,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl ClassSchedule {
    /// Time left until today's start, if the class meets today.
    /// Negative once the start has passed.
    fn until_start_today(&self, now: NaiveDateTime) -> Option<Duration> {
        let start = self.start_time?;
        if !self.days.includes(now.date()) {
            return None;
        }
        Some(now.date().and_time(start) - now)
    }

    pub fn is_live_now(&self, now: NaiveDateTime) -> bool {
        if self.course_type != CourseType::Live {
            return false;
        }
        let (Some(start), Some(end)) = (self.start_time, self.end_time) else {
            return false;
        };
        let time = now.time();
        self.days.includes(now.date()) && start <= time && time <= end
    }

    pub fn is_starting_soon(&self, now: NaiveDateTime, window_minutes: i64) -> bool {
        match self.until_start_today(now) {
            Some(left) => left >= Duration::zero() && left <= Duration::minutes(window_minutes),
            None => false,
        }
    }

    /// Whole minutes until today's start, rounded up. None once started or on
    /// days without a class.
    pub fn minutes_until_class(&self, now: NaiveDateTime) -> Option<i64> {
        let left = self.until_start_today(now)?;
        if left < Duration::zero() {
            return None;
        }
        let millis = left.num_milliseconds();
        Some((millis + 59_999) / 60_000)
    }

    pub fn next_class_datetime(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.course_type != CourseType::Live || self.days.is_empty() {
            return None;
        }
        let start = self.start_time?;
        let today = now.date();

        if self.days.includes(today) && start > now.time() {
            return Some(today.and_time(start));
        }

        (1..=7)
            .map(|offset| today + Duration::days(offset))
            .find(|date| self.days.includes(*date))
            .map(|date| date.and_time(start))
    }

    pub fn class_status(&self, now: NaiveDateTime, window_minutes: i64) -> ClassStatus {
        if self.course_type != CourseType::Live {
            ClassStatus::Recorded
        } else if self.is_live_now(now) {
            ClassStatus::LiveNow
        } else if self.is_starting_soon(now, window_minutes) {
            ClassStatus::StartingSoon
        } else {
            ClassStatus::Scheduled
        }
    }

    /// Human readable schedule, e.g. "Mon, Wed · 08:00 AM - 09:00 AM".
    pub fn label(&self) -> Option<String> {
        let start = self.start_time?;
        if self.days.is_empty() {
            return None;
        }
        let mut time = start.format("%I:%M %p").to_string();
        if let Some(end) = self.end_time {
            time.push_str(&format!(" - {}", end.format("%I:%M %p")));
        }
        Some(format!("{} · {}", self.days, time))
    }
}
