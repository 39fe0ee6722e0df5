use chrono::NaiveDateTime;
use clap::Subcommand;
use quietalarm_core::quiet_hours;
use quietalarm_core::{
    AlarmCategory, Clock, DaySet, LocalTime, MinuteOfDay, QuietHoursSettings, SettingsStore,
    SqliteSettingsStore, SystemClock,
};
use serde_json::json;

#[derive(Subcommand)]
pub enum QuietHoursAction {
    /// Print the stored settings as JSON
    Get,
    /// Change one or more settings
    Set {
        /// Turn quiet hours on or off
        #[arg(long)]
        enabled: Option<bool>,
        /// Window start as HH:MM
        #[arg(long)]
        start: Option<String>,
        /// Window end as HH:MM (earlier than start wraps past midnight)
        #[arg(long)]
        end: Option<String>,
        /// Monday-first day indices, e.g. "0,1,2,3,4"
        #[arg(long)]
        days: Option<String>,
        /// Let safety-critical alarms ring during quiet hours
        #[arg(long)]
        bypass_safety_critical: Option<bool>,
    },
    /// Check whether an alarm would be suppressed
    Check {
        /// Local time as "YYYY-MM-DD HH:MM" (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Alarm category (standard or safety-critical)
        #[arg(long, default_value = "standard")]
        category: String,
    },
}

pub fn run(action: QuietHoursAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteSettingsStore::open()?;
    match action {
        QuietHoursAction::Get => {
            let config = store.load()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&QuietHoursSettings::from(&config))?
            );
        }
        QuietHoursAction::Set {
            enabled,
            start,
            end,
            days,
            bypass_safety_critical,
        } => {
            let mut config = store.load()?;
            if let Some(enabled) = enabled {
                config.enabled = enabled;
            }
            if let Some(start) = start {
                config.start = parse_hm(&start)?;
            }
            if let Some(end) = end {
                config.end = parse_hm(&end)?;
            }
            if let Some(days) = days {
                config.active_days = DaySet::parse_list(&days);
            }
            if let Some(bypass) = bypass_safety_critical {
                config.bypass_safety_critical = bypass;
            }
            store.save(&config)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&QuietHoursSettings::from(&config))?
            );
        }
        QuietHoursAction::Check { at, category } => {
            let config = store.load()?;
            let now = match at {
                Some(raw) => LocalTime::from(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M")?),
                None => SystemClock.now_local(),
            };
            let category: AlarmCategory = category.parse()?;
            let decision = quiet_hours::decide(&config, now, category);
            let out = json!({
                "weekday": now.weekday.to_string(),
                "time": format!("{:02}:{:02}", now.hour, now.minute),
                "category": category,
                "active": decision.active,
                "bypass": decision.bypass,
                "suppressed": decision.suppresses(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn parse_hm(raw: &str) -> Result<MinuteOfDay, Box<dyn std::error::Error>> {
    let (hour, minute) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{raw}'"))?;
    Ok(MinuteOfDay::from_hm(
        hour.trim().parse()?,
        minute.trim().parse()?,
    )?)
}
