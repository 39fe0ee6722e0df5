//! Integration tests for the schedule → fire → snooze/stop flow.
//!
//! These tests drive the public engine API with recording surfaces and a
//! manual clock, the way a host platform would.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use quietalarm_core::alarm::{
    AlarmNotification, AlarmNotifier, AlarmSound, DeliveryOptions, NotificationActionKind, Tone,
    ALARM_NOTIFICATION_SLOT,
};
use quietalarm_core::error::{AudioError, TimerError};
use quietalarm_core::{
    AlarmCategory, AlarmDeliveryController, AlarmId, AlarmPayload, AlarmScheduler, Clock,
    DaySet, DeliveryOutcome, DeliveryState, ManualClock, MemorySettingsStore, MinuteOfDay,
    QuietHoursConfig, SettingsStore, WakeMode, WakeTimer,
};

#[derive(Default)]
struct RecordingTimer {
    armed: Mutex<Vec<(AlarmId, i64)>>,
    disarmed: Mutex<Vec<AlarmId>>,
}

impl WakeTimer for RecordingTimer {
    fn arm_exact_allow_while_idle(&self, id: AlarmId, at: i64) -> Result<(), TimerError> {
        self.armed.lock().unwrap().push((id, at));
        Ok(())
    }
    fn arm_exact(&self, id: AlarmId, at: i64) {
        self.armed.lock().unwrap().push((id, at));
    }
    fn disarm(&self, id: AlarmId) {
        self.disarmed.lock().unwrap().push(id);
    }
}

#[derive(Default)]
struct RecordingSound {
    playing: Mutex<Option<Tone>>,
}

impl AlarmSound for RecordingSound {
    fn start_loop(&self, tone: &Tone) -> Result<(), AudioError> {
        *self.playing.lock().unwrap() = Some(tone.clone());
        Ok(())
    }
    fn stop(&self) {
        *self.playing.lock().unwrap() = None;
    }
}

#[derive(Default)]
struct RecordingNotifier {
    shown: Mutex<Option<AlarmNotification>>,
}

impl AlarmNotifier for RecordingNotifier {
    fn post(&self, notification: &AlarmNotification) {
        *self.shown.lock().unwrap() = Some(notification.clone());
    }
    fn dismiss(&self, slot: i32) {
        let mut shown = self.shown.lock().unwrap();
        if shown.as_ref().map(|n| n.slot) == Some(slot) {
            *shown = None;
        }
    }
}

struct Harness {
    controller: AlarmDeliveryController,
    settings: Arc<MemorySettingsStore>,
    clock: Arc<ManualClock>,
    sound: Arc<RecordingSound>,
    notifier: Arc<RecordingNotifier>,
    timer: Arc<RecordingTimer>,
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    // January 2024: the 1st is a Monday.
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .unwrap()
}

fn weeknight_quiet_hours() -> QuietHoursConfig {
    QuietHoursConfig {
        enabled: true,
        start: MinuteOfDay::from_hm(22, 0).unwrap(),
        end: MinuteOfDay::from_hm(7, 0).unwrap(),
        active_days: DaySet::WEEKDAYS,
        bypass_safety_critical: true,
    }
}

fn harness(now: DateTime<FixedOffset>) -> Harness {
    let settings = Arc::new(MemorySettingsStore::new(weeknight_quiet_hours()));
    let clock = Arc::new(ManualClock::new(now));
    let sound = Arc::new(RecordingSound::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let timer = Arc::new(RecordingTimer::default());
    let controller = AlarmDeliveryController::new(
        settings.clone(),
        Arc::new(AlarmScheduler::new(timer.clone())),
        sound.clone(),
        notifier.clone(),
        clock.clone(),
        DeliveryOptions::default(),
    );
    Harness {
        controller,
        settings,
        clock,
        sound,
        notifier,
        timer,
    }
}

fn schedule(h: &Harness, id: i32, category: AlarmCategory) -> i64 {
    let fire_at = h.clock.now_epoch_millis();
    let entry = h.controller.scheduler().schedule(AlarmPayload::new(
        id,
        fire_at,
        "Alarm",
        "Time to get up",
        category,
    ));
    assert_eq!(entry.mode, WakeMode::ExactAllowWhileIdle);
    fire_at
}

#[test]
fn test_tuesday_night_standard_alarm_is_suppressed() {
    let h = harness(at(2, 23, 30));
    let fire_at = schedule(&h, 1, AlarmCategory::Standard);

    let outcome = h.controller.on_wake(AlarmId(1), fire_at);

    assert_eq!(outcome, Some(DeliveryOutcome::Suppressed));
    assert_eq!(h.controller.state(AlarmId(1)), DeliveryState::Suppressed);
    assert!(h.sound.playing.lock().unwrap().is_none());
    assert!(h.notifier.shown.lock().unwrap().is_none());
    assert!(!h.controller.scheduler().is_scheduled(AlarmId(1)));
}

#[test]
fn test_tuesday_night_safety_critical_alarm_rings() {
    let h = harness(at(2, 23, 30));
    let fire_at = schedule(&h, 1, AlarmCategory::SafetyCritical);

    assert_eq!(
        h.controller.on_wake(AlarmId(1), fire_at),
        Some(DeliveryOutcome::Delivered)
    );

    let shown = h.notifier.shown.lock().unwrap().clone().unwrap();
    assert_eq!(shown.slot, ALARM_NOTIFICATION_SLOT);
    assert!(shown.persistent);
    assert_eq!(
        shown.actions.iter().map(|a| a.kind).collect::<Vec<_>>(),
        vec![NotificationActionKind::Snooze, NotificationActionKind::Stop]
    );
    assert!(h.sound.playing.lock().unwrap().is_some());
}

#[test]
fn test_saturday_night_is_outside_weekday_window() {
    let h = harness(at(6, 23, 30));
    let fire_at = schedule(&h, 1, AlarmCategory::Standard);
    assert_eq!(
        h.controller.on_wake(AlarmId(1), fire_at),
        Some(DeliveryOutcome::Delivered)
    );
}

#[test]
fn test_settings_edit_applies_to_next_fire() {
    let h = harness(at(2, 23, 30));
    let mut config = weeknight_quiet_hours();
    config.enabled = false;
    h.settings.save(&config).unwrap();

    let fire_at = schedule(&h, 1, AlarmCategory::Standard);
    assert_eq!(
        h.controller.on_wake(AlarmId(1), fire_at),
        Some(DeliveryOutcome::Delivered)
    );
}

#[test]
fn test_snooze_then_fire_again_then_stop() {
    let h = harness(at(6, 8, 0));
    let fire_at = schedule(&h, 5, AlarmCategory::Standard);
    h.controller.on_wake(AlarmId(5), fire_at);

    let payload = h.controller.active_payload().unwrap();
    let entry = h.controller.on_snooze(&payload);
    assert_eq!(entry.id, AlarmId(5));
    assert_eq!(
        entry.fire_at_epoch_millis,
        fire_at + Duration::seconds(60).num_milliseconds()
    );
    assert_eq!(entry.payload.title, "Wake Up!");
    assert_eq!(entry.payload.body, "Snoozed Alarm");
    assert!(h.sound.playing.lock().unwrap().is_none());
    assert!(h.notifier.shown.lock().unwrap().is_none());
    assert_eq!(h.timer.armed.lock().unwrap().len(), 2);

    h.clock.advance(Duration::seconds(60));
    assert_eq!(
        h.controller.on_wake(AlarmId(5), entry.fire_at_epoch_millis),
        Some(DeliveryOutcome::Delivered)
    );

    let payload = h.controller.active_payload().unwrap();
    h.controller.on_stop(&payload);
    assert_eq!(h.controller.state(AlarmId(5)), DeliveryState::Stopped);
    assert!(h.controller.active_payload().is_none());
    assert!(h.sound.playing.lock().unwrap().is_none());
}

#[test]
fn test_rescheduled_alarm_ignores_stale_wake() {
    let h = harness(at(6, 8, 0));
    let first = schedule(&h, 3, AlarmCategory::Standard);
    h.controller.scheduler().schedule(AlarmPayload::new(
        3,
        first + 3_600_000,
        "Later",
        "Moved",
        AlarmCategory::Standard,
    ));

    assert_eq!(h.controller.on_wake(AlarmId(3), first), None);
    assert!(h.timer.disarmed.lock().unwrap().contains(&AlarmId(3)));
    assert!(h.controller.scheduler().is_scheduled(AlarmId(3)));
}
