mod delivery;
mod payload;
mod runtime;
mod scheduler;

pub use delivery::{
    AlarmDeliveryController, AlarmNotification, AlarmNotifier, AlarmSound, DeliveryOptions,
    DeliveryOutcome, DeliveryState, NotificationAction, NotificationActionKind, Tone,
    ALARM_NOTIFICATION_SLOT, ALARM_VIBRATION_PATTERN_MS, FULL_SCREEN_REQUEST_CODE,
    SNOOZE_ACTION_ID, STOP_ACTION_ID,
};
pub use payload::{AlarmCategory, AlarmId, AlarmPayload};
pub use runtime::{AlarmRuntime, AlarmSignal, TokioWakeTimer};
pub use scheduler::{AlarmScheduler, ScheduleEntry, WakeMode, WakeTimer};
