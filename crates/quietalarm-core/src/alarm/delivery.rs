//! Alarm delivery state machine.
//!
//! Runs when a scheduled wake fires and decides what the user experiences.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Scheduled -> Firing -> Suppressed
//!                             -> Delivered -> Snoozed -> Scheduled
//!                                          -> Stopped
//! ```
//!
//! A suppressed alarm is dropped silently: it is not deferred to the end
//! of quiet hours.
//!
//! ## Surfaces
//!
//! The audio and notification surfaces are shared by every alarm. At most
//! one delivered session owns them; a new delivery tears the previous one
//! down before starting its own tone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::payload::{AlarmId, AlarmPayload};
use super::scheduler::{AlarmScheduler, ScheduleEntry};
use crate::clock::Clock;
use crate::error::AudioError;
use crate::quiet_hours::{self, QuietHoursConfig, QuietHoursDecision};
use crate::storage::{EngineConfig, SettingsStore};

/// The single notification slot used for alarms.
pub const ALARM_NOTIFICATION_SLOT: i32 = 99;
/// Request code of the full-screen presentation intent.
pub const FULL_SCREEN_REQUEST_CODE: i32 = 0;
/// Request code of the snooze action.
pub const SNOOZE_ACTION_ID: i32 = 1;
/// Request code of the stop action.
pub const STOP_ACTION_ID: i32 = 2;
/// Off/on durations in milliseconds, starting with the initial delay.
pub const ALARM_VIBRATION_PATTERN_MS: [u64; 4] = [0, 500, 1000, 500];

/// Which tone the audio surface should loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// A bundled tone asset by name.
    Asset(String),
    /// The host's default alarm tone.
    PlatformDefault,
}

/// Audio playback surface.
pub trait AlarmSound: Send + Sync {
    /// Start looping `tone`, replacing anything already playing.
    fn start_loop(&self, tone: &Tone) -> Result<(), AudioError>;
    /// Stop playback. Idempotent.
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationActionKind {
    Snooze,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub kind: NotificationActionKind,
    pub label: String,
    pub request_code: i32,
}

/// What the notification surface is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmNotification {
    pub slot: i32,
    pub alarm_id: AlarmId,
    pub title: String,
    pub body: String,
    /// Not dismissed by tapping; stays until snooze or stop.
    pub persistent: bool,
    pub max_priority: bool,
    /// Request a screen-waking full-screen presentation.
    pub full_screen_request_code: Option<i32>,
    pub vibrate_pattern_ms: Vec<u64>,
    pub actions: Vec<NotificationAction>,
}

impl AlarmNotification {
    pub fn for_payload(payload: &AlarmPayload) -> Self {
        Self {
            slot: ALARM_NOTIFICATION_SLOT,
            alarm_id: payload.id,
            title: payload.title.clone(),
            body: payload.body.clone(),
            persistent: true,
            max_priority: true,
            full_screen_request_code: Some(FULL_SCREEN_REQUEST_CODE),
            vibrate_pattern_ms: ALARM_VIBRATION_PATTERN_MS.to_vec(),
            actions: vec![
                NotificationAction {
                    kind: NotificationActionKind::Snooze,
                    label: "SNOOZE".into(),
                    request_code: SNOOZE_ACTION_ID,
                },
                NotificationAction {
                    kind: NotificationActionKind::Stop,
                    label: "STOP".into(),
                    request_code: STOP_ACTION_ID,
                },
            ],
        }
    }
}

/// Notification surface.
pub trait AlarmNotifier: Send + Sync {
    fn post(&self, notification: &AlarmNotification);
    /// Remove whatever occupies `slot`. Idempotent.
    fn dismiss(&self, slot: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Idle,
    Scheduled,
    Firing,
    Delivered,
    Suppressed,
    Snoozed,
    Stopped,
}

/// Tunables for the delivery controller.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    pub snooze_delay: Duration,
    pub snooze_title: String,
    pub snooze_body: String,
    pub tone: Tone,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for DeliveryOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            snooze_delay: config.snooze_delay(),
            snooze_title: config.alarm.snooze_title.clone(),
            snooze_body: config.alarm.snooze_body.clone(),
            tone: Tone::Asset(config.audio.tone.clone()),
        }
    }
}

/// Ownership of the audio and notification surfaces.
#[derive(Debug, Clone)]
struct ActiveSession {
    payload: AlarmPayload,
    tone: Option<Tone>,
}

pub struct AlarmDeliveryController {
    settings: Arc<dyn SettingsStore>,
    scheduler: Arc<AlarmScheduler>,
    sound: Arc<dyn AlarmSound>,
    notifier: Arc<dyn AlarmNotifier>,
    clock: Arc<dyn Clock>,
    options: DeliveryOptions,
    session: Mutex<Option<ActiveSession>>,
    id_locks: Mutex<HashMap<AlarmId, Arc<Mutex<()>>>>,
    states: Mutex<HashMap<AlarmId, DeliveryState>>,
}

impl AlarmDeliveryController {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        scheduler: Arc<AlarmScheduler>,
        sound: Arc<dyn AlarmSound>,
        notifier: Arc<dyn AlarmNotifier>,
        clock: Arc<dyn Clock>,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            settings,
            scheduler,
            sound,
            notifier,
            clock,
            options,
            session: Mutex::new(None),
            id_locks: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn scheduler(&self) -> &Arc<AlarmScheduler> {
        &self.scheduler
    }

    pub fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    /// Lifecycle state of `id`. A pending schedule always reads as
    /// `Scheduled`.
    pub fn state(&self, id: AlarmId) -> DeliveryState {
        if self.scheduler.is_scheduled(id) {
            return DeliveryState::Scheduled;
        }
        lock(&self.states)
            .get(&id)
            .copied()
            .unwrap_or(DeliveryState::Idle)
    }

    /// Payload of the alarm currently ringing, if any.
    pub fn active_payload(&self) -> Option<AlarmPayload> {
        lock(&self.session).as_ref().map(|s| s.payload.clone())
    }

    /// Evaluate quiet hours for `payload` against a fresh settings snapshot.
    pub fn evaluate(&self, payload: &AlarmPayload) -> QuietHoursDecision {
        let config = self.load_settings();
        quiet_hours::decide(&config, self.clock.now_local(), payload.category)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Handle a raw timer wake for `id` scheduled at `fire_at_epoch_millis`.
    ///
    /// Stale wakes (the entry was replaced or canceled) return `None`.
    pub fn on_wake(&self, id: AlarmId, fire_at_epoch_millis: i64) -> Option<DeliveryOutcome> {
        self.serialized(id, || -> Option<DeliveryOutcome> {
            let payload = self.scheduler.take_due(id, fire_at_epoch_millis)?;
            Some(self.fire(&payload))
        })
    }

    /// Handle a fired alarm: suppress it under quiet hours, deliver otherwise.
    pub fn on_fire(&self, payload: &AlarmPayload) -> DeliveryOutcome {
        self.serialized(payload.id, || {
            // Acknowledge so a pending entry for this exact fire cannot re-fire.
            let _ = self
                .scheduler
                .take_due(payload.id, payload.fire_at_epoch_millis);
            self.fire(payload)
        })
    }

    /// Silence the alarm and re-arm it `snooze_delay` from now.
    pub fn on_snooze(&self, payload: &AlarmPayload) -> ScheduleEntry {
        self.serialized(payload.id, || {
            self.teardown_for(payload.id);
            self.set_state(payload.id, DeliveryState::Snoozed);

            let fire_at = self
                .clock
                .now_epoch_millis()
                .saturating_add(self.options.snooze_delay.num_milliseconds());
            let snoozed = payload.snoozed(
                fire_at,
                &self.options.snooze_title,
                &self.options.snooze_body,
            );
            tracing::info!(id = %payload.id, fire_at, "alarm snoozed");
            let entry = self.scheduler.schedule(snoozed);
            self.set_state(payload.id, DeliveryState::Scheduled);
            entry
        })
    }

    /// Silence the alarm and drop any pending schedule for it.
    pub fn on_stop(&self, payload: &AlarmPayload) {
        self.serialized(payload.id, || {
            self.teardown_for(payload.id);
            self.scheduler.cancel(payload.id);
            self.set_state(payload.id, DeliveryState::Stopped);
            tracing::info!(id = %payload.id, "alarm stopped");
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fire(&self, payload: &AlarmPayload) -> DeliveryOutcome {
        self.set_state(payload.id, DeliveryState::Firing);

        let decision = self.evaluate(payload);
        if decision.suppresses() {
            self.set_state(payload.id, DeliveryState::Suppressed);
            tracing::info!(
                id = %payload.id,
                category = %payload.category,
                "alarm suppressed by quiet hours"
            );
            return DeliveryOutcome::Suppressed;
        }

        self.deliver(payload);
        self.set_state(payload.id, DeliveryState::Delivered);
        tracing::info!(
            id = %payload.id,
            category = %payload.category,
            bypassed_quiet_hours = decision.active && decision.bypass,
            "alarm delivered"
        );
        DeliveryOutcome::Delivered
    }

    fn deliver(&self, payload: &AlarmPayload) {
        let mut session = lock(&self.session);

        if let Some(previous) = session.take() {
            tracing::info!(
                previous = %previous.payload.id,
                next = %payload.id,
                "tearing down previous alarm session"
            );
            self.silence();
            if previous.payload.id != payload.id {
                self.set_state(previous.payload.id, DeliveryState::Stopped);
            }
        }

        let tone = self.start_tone();
        self.notifier.post(&AlarmNotification::for_payload(payload));

        *session = Some(ActiveSession {
            payload: payload.clone(),
            tone,
        });
    }

    /// Start the configured tone, substituting the platform default when the
    /// asset is missing. Returns the tone that is actually playing.
    fn start_tone(&self) -> Option<Tone> {
        match self.sound.start_loop(&self.options.tone) {
            Ok(()) => Some(self.options.tone.clone()),
            Err(AudioError::MissingResource(name)) => {
                tracing::warn!(tone = %name, "alarm tone missing, using platform default");
                match self.sound.start_loop(&Tone::PlatformDefault) {
                    Ok(()) => Some(Tone::PlatformDefault),
                    Err(e) => {
                        tracing::error!(error = %e, "default alarm tone failed, continuing silently");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "alarm tone failed, continuing silently");
                None
            }
        }
    }

    /// End the active session if it belongs to `id`. With no active session
    /// the surfaces are still cleared, since they are idempotent.
    fn teardown_for(&self, id: AlarmId) {
        let mut session = lock(&self.session);
        match session.as_ref() {
            Some(active) if active.payload.id != id => {
                tracing::debug!(
                    %id,
                    active = %active.payload.id,
                    "action for inactive alarm leaves current session ringing"
                );
            }
            Some(active) => {
                tracing::debug!(%id, tone = ?active.tone, "ending alarm session");
                *session = None;
                self.silence();
            }
            None => self.silence(),
        }
    }

    fn silence(&self) {
        self.sound.stop();
        self.notifier.dismiss(ALARM_NOTIFICATION_SLOT);
    }

    fn load_settings(&self) -> QuietHoursConfig {
        self.settings.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read quiet hours settings, using defaults");
            QuietHoursConfig::default()
        })
    }

    /// Run `f` holding the per-id lock for `id`.
    ///
    /// The lock entry is dropped again when no other call is holding or
    /// waiting for it. Clones are only taken under the map lock, so a
    /// strong count of two (map plus this call) means nobody else has one.
    fn serialized<R>(&self, id: AlarmId, f: impl FnOnce() -> R) -> R {
        let id_lock = lock(&self.id_locks).entry(id).or_default().clone();
        let result = {
            let _guard = lock(&id_lock);
            f()
        };

        let mut locks = lock(&self.id_locks);
        if Arc::strong_count(&id_lock) == 2
            && locks.get(&id).is_some_and(|held| Arc::ptr_eq(held, &id_lock))
        {
            locks.remove(&id);
        }
        result
    }

    fn set_state(&self, id: AlarmId, state: DeliveryState) {
        lock(&self.states).insert(id, state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
