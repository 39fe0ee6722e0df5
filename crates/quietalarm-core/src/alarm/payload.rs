use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller-chosen alarm identifier. One pending schedule exists per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub i32);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i32> for AlarmId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Alarm category. Decides whether quiet hours may be bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlarmCategory {
    #[default]
    Standard,
    SafetyCritical,
}

impl AlarmCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmCategory::Standard => "standard",
            AlarmCategory::SafetyCritical => "safetyCritical",
        }
    }

    /// Parse a boundary string, treating anything unrecognised as
    /// [`AlarmCategory::Standard`].
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(category = raw, "unknown alarm category, treating as standard");
            AlarmCategory::Standard
        })
    }
}

impl fmt::Display for AlarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "" | "standard" => Ok(AlarmCategory::Standard),
            "safetycritical" => Ok(AlarmCategory::SafetyCritical),
            _ => Err(format!("unknown alarm category: {s}")),
        }
    }
}

/// Everything the engine needs to present an alarm when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPayload {
    pub id: AlarmId,
    pub fire_at_epoch_millis: i64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: AlarmCategory,
}

impl AlarmPayload {
    pub fn new(
        id: impl Into<AlarmId>,
        fire_at_epoch_millis: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        category: AlarmCategory,
    ) -> Self {
        Self {
            id: id.into(),
            fire_at_epoch_millis,
            title: title.into(),
            body: body.into(),
            category,
        }
    }

    /// Copy for a snoozed re-fire: same id and category, new time and labels.
    pub fn snoozed(&self, fire_at_epoch_millis: i64, title: &str, body: &str) -> Self {
        Self {
            id: self.id,
            fire_at_epoch_millis,
            title: title.to_string(),
            body: body.to_string(),
            category: self.category,
        }
    }
}
