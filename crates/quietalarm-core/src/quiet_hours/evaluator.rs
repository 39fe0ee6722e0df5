//! Quiet hours evaluation.
//!
//! Pure functions over a [`QuietHoursConfig`] snapshot and a local
//! wall-clock reading. Callers load a fresh snapshot for every evaluation;
//! nothing here caches settings.
//!
//! ## Window rule
//!
//! ```text
//! start <= end   active iff start <= now < end              (same day)
//! start >  end   active iff now >= start || now < end        (overnight)
//! ```
//!
//! `start == end` takes the same-day branch and is never active.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use super::config::QuietHoursConfig;
use crate::alarm::AlarmCategory;

/// Local wall-clock reading used for quiet hours checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl LocalTime {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            weekday,
            hour,
            minute,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl From<NaiveDateTime> for LocalTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            weekday: dt.weekday(),
            hour: dt.hour(),
            minute: dt.minute(),
        }
    }
}

/// Outcome of gating a single alarm against quiet hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursDecision {
    /// Quiet hours are in effect at the evaluated instant.
    pub active: bool,
    /// The alarm's category is exempt from quiet hours.
    pub bypass: bool,
}

impl QuietHoursDecision {
    /// True when the alarm must be dropped silently.
    pub fn suppresses(&self) -> bool {
        self.active && !self.bypass
    }
}

/// Check whether quiet hours are in effect at `now`.
pub fn is_active(config: &QuietHoursConfig, now: LocalTime) -> bool {
    if !config.enabled {
        return false;
    }

    if !config.active_days.contains(now.weekday) {
        return false;
    }

    let current = now.minutes();
    let start = u32::from(config.start.minutes());
    let end = u32::from(config.end.minutes());

    if start <= end {
        current >= start && current < end
    } else {
        current >= start || current < end
    }
}

/// Whether an alarm of `category` may ring during quiet hours.
///
/// Only safety-critical alarms bypass, and only while the exception is
/// switched on.
pub fn should_bypass(config: &QuietHoursConfig, category: AlarmCategory) -> bool {
    match category {
        AlarmCategory::SafetyCritical => config.bypass_safety_critical,
        AlarmCategory::Standard => false,
    }
}

/// Evaluate both rules for one alarm.
pub fn decide(config: &QuietHoursConfig, now: LocalTime, category: AlarmCategory) -> QuietHoursDecision {
    let decision = QuietHoursDecision {
        active: is_active(config, now),
        bypass: should_bypass(config, category),
    };
    tracing::debug!(
        active = decision.active,
        bypass = decision.bypass,
        weekday = %now.weekday,
        hour = now.hour,
        minute = now.minute,
        start = %config.start,
        end = %config.end,
        "quiet hours evaluated"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiet_hours::{DaySet, MinuteOfDay};
    use proptest::prelude::*;

    fn config(start: (u32, u32), end: (u32, u32), days: DaySet) -> QuietHoursConfig {
        QuietHoursConfig {
            enabled: true,
            start: MinuteOfDay::from_hm(start.0, start.1).unwrap(),
            end: MinuteOfDay::from_hm(end.0, end.1).unwrap(),
            active_days: days,
            bypass_safety_critical: true,
        }
    }

    fn weekday(index: u8) -> Weekday {
        Weekday::try_from(index).unwrap()
    }

    #[test]
    fn overnight_window_tuesday_late_evening() {
        let cfg = config((22, 0), (7, 0), DaySet::WEEKDAYS);
        let now = LocalTime::new(Weekday::Tue, 23, 30);
        assert!(is_active(&cfg, now));
        assert!(decide(&cfg, now, AlarmCategory::Standard).suppresses());
        assert!(!decide(&cfg, now, AlarmCategory::SafetyCritical).suppresses());
    }

    #[test]
    fn saturday_is_not_an_active_day() {
        let cfg = config((22, 0), (7, 0), DaySet::WEEKDAYS);
        let now = LocalTime::new(Weekday::Sat, 23, 30);
        assert!(!is_active(&cfg, now));
        assert!(!decide(&cfg, now, AlarmCategory::Standard).suppresses());
    }

    #[test]
    fn overnight_window_early_morning_uses_current_day() {
        let cfg = config((22, 0), (7, 0), DaySet::WEEKDAYS);
        // Saturday 06:00 is the tail of Friday night's window but Saturday
        // is not selected, so the check follows the current day.
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Sat, 6, 0)));
        assert!(is_active(&cfg, LocalTime::new(Weekday::Mon, 6, 59)));
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Mon, 7, 0)));
    }

    #[test]
    fn zero_length_window_is_never_active() {
        let cfg = config((9, 0), (9, 0), DaySet::from_indices([0]));
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Mon, 9, 0)));
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Mon, 8, 59)));
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Mon, 9, 1)));
    }

    #[test]
    fn same_day_window_boundaries() {
        let cfg = config((9, 0), (17, 0), DaySet::ALL);
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Wed, 8, 59)));
        assert!(is_active(&cfg, LocalTime::new(Weekday::Wed, 9, 0)));
        assert!(is_active(&cfg, LocalTime::new(Weekday::Wed, 16, 59)));
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Wed, 17, 0)));
    }

    #[test]
    fn empty_day_set_never_activates() {
        let cfg = config((0, 0), (23, 59), DaySet::EMPTY);
        assert!(!is_active(&cfg, LocalTime::new(Weekday::Mon, 12, 0)));
    }

    #[test]
    fn bypass_matrix() {
        let mut cfg = QuietHoursConfig::default();
        assert!(should_bypass(&cfg, AlarmCategory::SafetyCritical));
        assert!(!should_bypass(&cfg, AlarmCategory::Standard));
        cfg.bypass_safety_critical = false;
        assert!(!should_bypass(&cfg, AlarmCategory::SafetyCritical));
        assert!(!should_bypass(&cfg, AlarmCategory::Standard));
    }

    #[test]
    fn local_time_from_naive_datetime() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(23, 30, 15)
            .unwrap();
        let lt = LocalTime::from(dt);
        assert_eq!(lt, LocalTime::new(Weekday::Tue, 23, 30));
        assert_eq!(lt.minutes(), 1410);
    }

    proptest! {
        #[test]
        fn same_day_window_is_half_open(
            start in 0u16..1440,
            end in 0u16..1440,
            now in 0u32..1440,
            day in 0u8..7,
        ) {
            prop_assume!(start < end);
            let cfg = QuietHoursConfig {
                enabled: true,
                start: MinuteOfDay::new(start).unwrap(),
                end: MinuteOfDay::new(end).unwrap(),
                active_days: DaySet::ALL,
                bypass_safety_critical: true,
            };
            let lt = LocalTime::new(weekday(day), now / 60, now % 60);
            let expected = now >= u32::from(start) && now < u32::from(end);
            prop_assert_eq!(is_active(&cfg, lt), expected);
        }

        #[test]
        fn overnight_window_wraps(
            start in 0u16..1440,
            end in 0u16..1440,
            now in 0u32..1440,
            day in 0u8..7,
        ) {
            prop_assume!(start > end);
            let cfg = QuietHoursConfig {
                enabled: true,
                start: MinuteOfDay::new(start).unwrap(),
                end: MinuteOfDay::new(end).unwrap(),
                active_days: DaySet::ALL,
                bypass_safety_critical: true,
            };
            let lt = LocalTime::new(weekday(day), now / 60, now % 60);
            let expected = now >= u32::from(start) || now < u32::from(end);
            prop_assert_eq!(is_active(&cfg, lt), expected);
        }

        #[test]
        fn disabled_is_never_active(
            start in 0u16..1440,
            end in 0u16..1440,
            now in 0u32..1440,
            day in 0u8..7,
            mask in 0u8..128,
        ) {
            let cfg = QuietHoursConfig {
                enabled: false,
                start: MinuteOfDay::new(start).unwrap(),
                end: MinuteOfDay::new(end).unwrap(),
                active_days: DaySet::from_indices((0u8..7).filter(|i| mask & (1 << i) != 0)),
                bypass_safety_critical: true,
            };
            prop_assert!(!is_active(&cfg, LocalTime::new(weekday(day), now / 60, now % 60)));
        }

        #[test]
        fn unselected_day_is_never_active(
            start in 0u16..1440,
            end in 0u16..1440,
            now in 0u32..1440,
            day in 0u8..7,
        ) {
            let mut days = DaySet::ALL;
            days.remove(weekday(day));
            let cfg = QuietHoursConfig {
                enabled: true,
                start: MinuteOfDay::new(start).unwrap(),
                end: MinuteOfDay::new(end).unwrap(),
                active_days: days,
                bypass_safety_critical: true,
            };
            prop_assert!(!is_active(&cfg, LocalTime::new(weekday(day), now / 60, now % 60)));
        }
    }
}
