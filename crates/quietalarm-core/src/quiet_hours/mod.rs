mod config;
mod evaluator;

pub use config::{DaySet, MinuteOfDay, QuietHoursConfig, MINUTES_PER_DAY};
pub use evaluator::{decide, is_active, should_bypass, LocalTime, QuietHoursDecision};
