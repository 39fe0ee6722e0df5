use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmCategory, AlarmId, ScheduleEntry, WakeMode};

/// Every alarm state change produces an Event.
/// Front ends print or forward them; the engine does not depend on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlarmEvent {
    AlarmScheduled {
        id: AlarmId,
        fire_at_epoch_millis: i64,
        mode: WakeMode,
        at: DateTime<Utc>,
    },
    AlarmCanceled {
        id: AlarmId,
        at: DateTime<Utc>,
    },
    AlarmDelivered {
        id: AlarmId,
        category: AlarmCategory,
        title: String,
        body: String,
        at: DateTime<Utc>,
    },
    /// Dropped because quiet hours were active and the category may not
    /// bypass them.
    AlarmSuppressed {
        id: AlarmId,
        category: AlarmCategory,
        at: DateTime<Utc>,
    },
    AlarmSnoozed {
        id: AlarmId,
        fire_at_epoch_millis: i64,
        at: DateTime<Utc>,
    },
    AlarmStopped {
        id: AlarmId,
        at: DateTime<Utc>,
    },
}

impl AlarmEvent {
    pub fn scheduled(entry: &ScheduleEntry) -> Self {
        AlarmEvent::AlarmScheduled {
            id: entry.id,
            fire_at_epoch_millis: entry.fire_at_epoch_millis,
            mode: entry.mode,
            at: Utc::now(),
        }
    }

    pub fn id(&self) -> AlarmId {
        match self {
            AlarmEvent::AlarmScheduled { id, .. }
            | AlarmEvent::AlarmCanceled { id, .. }
            | AlarmEvent::AlarmDelivered { id, .. }
            | AlarmEvent::AlarmSuppressed { id, .. }
            | AlarmEvent::AlarmSnoozed { id, .. }
            | AlarmEvent::AlarmStopped { id, .. } => *id,
        }
    }
}
