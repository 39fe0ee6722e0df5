//! Quiet hours configuration types.
//!
//! Days are indexed Monday-first (`0 = Monday ... 6 = Sunday`), which is
//! what [`chrono::Weekday::num_days_from_monday`] yields. Hosts that number
//! days Sunday-first from 1 go through [`DaySet::from_platform_index`] and
//! [`DaySet::to_platform_index`] so the remap happens in exactly one place.

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock minute within a day, `0..=1439`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub fn new(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    /// Build from an hour (`0..=23`) and minute (`0..=59`).
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::OutOfRange {
                field: "hour",
                value: hour as i64,
                min: 0,
                max: 23,
            });
        }
        if minute > 59 {
            return Err(ValidationError::OutOfRange {
                field: "minute",
                value: minute as i64,
                min: 0,
                max: 59,
            });
        }
        Ok(Self((hour * 60 + minute) as u16))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }
}

impl TryFrom<u16> for MinuteOfDay {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("minute of day {value} is not within 0..=1439"))
    }
}

impl From<MinuteOfDay> for u16 {
    fn from(value: MinuteOfDay) -> Self {
        value.0
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// A set of weekdays stored as a 7-bit mask, bit 0 = Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct DaySet(u8);

impl DaySet {
    pub const EMPTY: DaySet = DaySet(0);
    pub const WEEKDAYS: DaySet = DaySet(0b001_1111);
    pub const ALL: DaySet = DaySet(0b111_1111);

    /// Build from Monday-first indices, ignoring anything outside `0..=6`.
    pub fn from_indices<I: IntoIterator<Item = u8>>(indices: I) -> Self {
        let mut set = Self::EMPTY;
        for index in indices {
            if let Some(day) = weekday_from_index(index) {
                set.insert(day);
            }
        }
        set
    }

    /// Parse a comma-separated list such as `"0,1,2,3,4"`.
    ///
    /// Malformed or out-of-range tokens are dropped with a warning; the rest
    /// of the list still applies.
    pub fn parse_list(raw: &str) -> Self {
        let mut set = Self::EMPTY;
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<u8>().ok().and_then(weekday_from_index) {
                Some(day) => set.insert(day),
                None => tracing::warn!(token, list = raw, "skipping malformed quiet hours day"),
            }
        }
        set
    }

    /// Render as the comma-separated Monday-first index list.
    pub fn to_list_string(self) -> String {
        self.indices()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_monday());
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Monday-first indices in ascending order.
    pub fn indices(self) -> impl Iterator<Item = u8> {
        (0u8..7).filter(move |i| self.0 & (1 << i) != 0)
    }

    /// Map a Sunday-first `1..=7` platform day number to a weekday.
    pub fn from_platform_index(platform_day: u8) -> Option<Weekday> {
        match platform_day {
            1 => Some(Weekday::Sun),
            2..=7 => weekday_from_index(platform_day - 2),
            _ => None,
        }
    }

    /// Map a weekday to the Sunday-first `1..=7` platform numbering.
    pub fn to_platform_index(day: Weekday) -> u8 {
        day.num_days_from_sunday() as u8 + 1
    }
}

impl From<Vec<u8>> for DaySet {
    fn from(indices: Vec<u8>) -> Self {
        Self::from_indices(indices)
    }
}

impl From<DaySet> for Vec<u8> {
    fn from(set: DaySet) -> Self {
        set.indices().collect()
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// User-configured quiet hours window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursConfig {
    pub enabled: bool,
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
    pub active_days: DaySet,
    pub bypass_safety_critical: bool,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: MinuteOfDay(22 * 60),
            end: MinuteOfDay(7 * 60),
            active_days: DaySet::WEEKDAYS,
            bypass_safety_critical: true,
        }
    }
}

impl QuietHoursConfig {
    /// True when the window crosses midnight (e.g. 22:00 - 07:00).
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}
