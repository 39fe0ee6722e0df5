//! Method-call boundary for UI front ends.
//!
//! A front end sends a method name plus a JSON argument object and gets a
//! JSON value back. Strings coming across the boundary (day lists,
//! categories) are parsed here, once.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;

use crate::alarm::{AlarmCategory, AlarmPayload, AlarmScheduler};
use crate::clock::Clock;
use crate::error::{BridgeError, CoreError};
use crate::events::AlarmEvent;
use crate::quiet_hours::{self, DaySet, MinuteOfDay, QuietHoursConfig};
use crate::storage::SettingsStore;

/// One call from a front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    fn args<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        let value = if self.args.is_null() {
            Value::Object(Default::default())
        } else {
            self.args.clone()
        };
        serde_json::from_value(value).map_err(|e| BridgeError::InvalidArgument {
            name: self.method.clone(),
            message: e.to_string(),
        })
    }
}

/// Quiet hours settings in the shape front ends exchange them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursSettings {
    pub enabled: bool,
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
    /// Comma-separated Monday-first day indices, e.g. `"0,1,2,3,4"`.
    pub days: String,
    #[serde(alias = "exceptionSafetyCritical")]
    pub bypass_safety_critical: bool,
}

impl From<&QuietHoursConfig> for QuietHoursSettings {
    fn from(config: &QuietHoursConfig) -> Self {
        Self {
            enabled: config.enabled,
            start_hour: config.start.hour(),
            start_minute: config.start.minute(),
            end_hour: config.end.hour(),
            end_minute: config.end.minute(),
            days: config.active_days.to_list_string(),
            bypass_safety_critical: config.bypass_safety_critical,
        }
    }
}

impl TryFrom<&QuietHoursSettings> for QuietHoursConfig {
    type Error = BridgeError;

    fn try_from(settings: &QuietHoursSettings) -> Result<Self, Self::Error> {
        let time = |name: &str, hour, minute| {
            MinuteOfDay::from_hm(hour, minute).map_err(|e| BridgeError::InvalidArgument {
                name: name.to_string(),
                message: e.to_string(),
            })
        };

        Ok(QuietHoursConfig {
            enabled: settings.enabled,
            start: time("start", settings.start_hour, settings.start_minute)?,
            end: time("end", settings.end_hour, settings.end_minute)?,
            active_days: DaySet::parse_list(&settings.days),
            bypass_safety_critical: settings.bypass_safety_critical,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleAlarmArgs {
    id: i32,
    time: i64,
    title: String,
    body: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelAlarmArgs {
    id: i32,
}

#[derive(Debug, Default, Deserialize)]
struct CheckArgs {
    #[serde(default)]
    category: Option<String>,
}

/// Dispatches [`MethodCall`]s onto the scheduler and the settings store.
pub struct Bridge {
    settings: Arc<dyn SettingsStore>,
    scheduler: Arc<AlarmScheduler>,
    clock: Arc<dyn Clock>,
    events: Option<UnboundedSender<AlarmEvent>>,
}

impl Bridge {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        scheduler: Arc<AlarmScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            scheduler,
            clock,
            events: None,
        }
    }

    /// Publish `AlarmScheduled` and `AlarmCanceled` for calls that change
    /// the schedule.
    pub fn with_events(mut self, events: UnboundedSender<AlarmEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Serve one call.
    ///
    /// # Errors
    ///
    /// `NotImplemented` for unknown methods, `InvalidArgument` for malformed
    /// arguments, `Core` when the settings store fails.
    pub fn handle(&self, call: &MethodCall) -> Result<Value, BridgeError> {
        tracing::debug!(method = %call.method, "bridge call");
        match call.method.as_str() {
            "scheduleAlarm" => self.schedule_alarm(call.args()?),
            "cancelAlarm" => self.cancel_alarm(call.args()?),
            "saveQuietHours" => self.save_quiet_hours(call.args()?),
            "getQuietHours" => self.get_quiet_hours(),
            "isQuietHoursActive" => self.is_quiet_hours_active(call.args()?),
            other => Err(BridgeError::NotImplemented(other.to_string())),
        }
    }

    fn schedule_alarm(&self, args: ScheduleAlarmArgs) -> Result<Value, BridgeError> {
        let category = args
            .category
            .as_deref()
            .map(AlarmCategory::parse_lenient)
            .unwrap_or_default();
        let entry = self.scheduler.schedule(AlarmPayload::new(
            args.id,
            args.time,
            args.title,
            args.body,
            category,
        ));
        self.emit(AlarmEvent::scheduled(&entry));
        Ok(json!("Alarm scheduled"))
    }

    fn cancel_alarm(&self, args: CancelAlarmArgs) -> Result<Value, BridgeError> {
        let id = args.id.into();
        if self.scheduler.cancel(id) {
            self.emit(AlarmEvent::AlarmCanceled { id, at: Utc::now() });
        }
        Ok(json!("Alarm canceled"))
    }

    fn save_quiet_hours(&self, settings: QuietHoursSettings) -> Result<Value, BridgeError> {
        let config = QuietHoursConfig::try_from(&settings)?;
        self.settings.save(&config)?;
        Ok(json!("Quiet hours saved"))
    }

    fn get_quiet_hours(&self) -> Result<Value, BridgeError> {
        let config = self.settings.load()?;
        Ok(serde_json::to_value(QuietHoursSettings::from(&config))
            .map_err(CoreError::from)?)
    }

    fn is_quiet_hours_active(&self, args: CheckArgs) -> Result<Value, BridgeError> {
        let config = self.settings.load()?;
        let category = args
            .category
            .as_deref()
            .map(AlarmCategory::parse_lenient)
            .unwrap_or_default();
        let decision = quiet_hours::decide(&config, self.clock.now_local(), category);
        Ok(json!({
            "active": decision.active,
            "bypass": decision.bypass,
        }))
    }

    fn emit(&self, event: AlarmEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
