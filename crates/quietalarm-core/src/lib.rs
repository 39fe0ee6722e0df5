//! # Quietalarm Core Library
//!
//! Exact-time alarm scheduling gated by a user-configured quiet hours window.
//! The CLI binary and any embedding front end drive the same engine.
//!
//! ## Architecture
//!
//! - **Quiet hours**: pure evaluation of a weekly window, including windows
//!   that wrap past midnight, plus the safety-critical bypass rule
//! - **Alarm scheduler**: one pending wake per alarm id, registered with a
//!   host [`WakeTimer`] that prefers wake-from-idle exact alarms
//! - **Delivery controller**: the fire/snooze/stop state machine that decides
//!   whether a fired alarm rings or is dropped
//! - **Storage**: SQLite key-value settings and TOML engine configuration
//! - **Bridge**: JSON method calls for UI front ends
//!
//! ## Key Components
//!
//! - [`AlarmScheduler`]: pending alarm registry
//! - [`AlarmDeliveryController`]: delivery state machine
//! - [`SettingsStore`]: durable quiet hours settings
//! - [`EngineConfig`]: snooze, tone and timer configuration
//! - [`Bridge`]: method-call boundary

pub mod alarm;
pub mod bridge;
pub mod clock;
pub mod error;
pub mod events;
pub mod quiet_hours;
pub mod storage;

pub use alarm::{
    AlarmCategory, AlarmDeliveryController, AlarmId, AlarmPayload, AlarmRuntime, AlarmScheduler,
    AlarmSignal, DeliveryOutcome, DeliveryState, ScheduleEntry, TokioWakeTimer, WakeMode,
    WakeTimer,
};
pub use bridge::{Bridge, MethodCall, QuietHoursSettings};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BridgeError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::AlarmEvent;
pub use quiet_hours::{DaySet, LocalTime, MinuteOfDay, QuietHoursConfig, QuietHoursDecision};
pub use storage::{Database, EngineConfig, MemorySettingsStore, SettingsStore, SqliteSettingsStore};
