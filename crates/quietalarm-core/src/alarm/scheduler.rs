//! Exact alarm scheduler.
//!
//! Keeps at most one pending [`ScheduleEntry`] per [`AlarmId`] and mirrors it
//! into the host's [`WakeTimer`]. Re-scheduling an id replaces the previous
//! registration under a single lock, so a replaced alarm can neither fire
//! twice nor fire at its old time.
//!
//! ## Wake modes
//!
//! The scheduler always asks for [`WakeMode::ExactAllowWhileIdle`] first.
//! Hosts that cannot wake from idle report
//! [`TimerError::ExactWakeUnavailable`] and the scheduler re-arms with plain
//! [`WakeMode::Exact`]. Scheduling itself never fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::payload::{AlarmId, AlarmPayload};
use crate::error::TimerError;

/// Timer primitive an entry was armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeMode {
    /// Fires at the requested instant, waking the device from idle.
    ExactAllowWhileIdle,
    /// Fires at the requested instant; may slip under deep power saving.
    Exact,
}

/// The host's alarm-timer facility.
///
/// Implementations deliver a wake for `id` at or after the given epoch
/// millisecond timestamp. Arming an id that is already armed replaces it.
pub trait WakeTimer: Send + Sync {
    /// Arm the most permissive exact primitive.
    fn arm_exact_allow_while_idle(&self, id: AlarmId, fire_at_epoch_millis: i64)
        -> Result<(), TimerError>;

    /// Arm the baseline exact primitive. Always available.
    fn arm_exact(&self, id: AlarmId, fire_at_epoch_millis: i64);

    /// Drop any registration for `id`. Unknown ids are ignored.
    fn disarm(&self, id: AlarmId);
}

/// The single outstanding registration for an alarm id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: AlarmId,
    pub fire_at_epoch_millis: i64,
    pub mode: WakeMode,
    pub payload: AlarmPayload,
}

pub struct AlarmScheduler {
    timer: Arc<dyn WakeTimer>,
    entries: Mutex<HashMap<AlarmId, ScheduleEntry>>,
}

impl AlarmScheduler {
    pub fn new(timer: Arc<dyn WakeTimer>) -> Self {
        Self {
            timer,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Arm `payload` for `payload.fire_at_epoch_millis`, replacing any
    /// pending entry with the same id.
    pub fn schedule(&self, payload: AlarmPayload) -> ScheduleEntry {
        let id = payload.id;
        let fire_at = payload.fire_at_epoch_millis;
        let mut entries = self.entries();

        if entries.remove(&id).is_some() {
            self.timer.disarm(id);
            tracing::debug!(%id, "replacing pending alarm");
        }

        let mode = match self.timer.arm_exact_allow_while_idle(id, fire_at) {
            Ok(()) => WakeMode::ExactAllowWhileIdle,
            Err(e) => {
                tracing::warn!(%id, error = %e, "falling back to exact alarm without idle wake");
                self.timer.arm_exact(id, fire_at);
                WakeMode::Exact
            }
        };

        let entry = ScheduleEntry {
            id,
            fire_at_epoch_millis: fire_at,
            mode,
            payload,
        };
        entries.insert(id, entry.clone());
        tracing::info!(%id, fire_at, ?mode, "alarm scheduled");
        entry
    }

    /// Remove the pending entry for `id`. Returns whether one existed.
    pub fn cancel(&self, id: AlarmId) -> bool {
        let mut entries = self.entries();
        let removed = entries.remove(&id).is_some();
        // Disarm regardless; the host may hold a registration from an
        // earlier process.
        self.timer.disarm(id);
        if removed {
            tracing::info!(%id, "alarm canceled");
        }
        removed
    }

    /// Acknowledge a wake for `id` at `fire_at_epoch_millis`.
    ///
    /// Returns the payload, clears the entry and disarms the host timer when
    /// the wake matches the live registration. Wakes for replaced or canceled entries return
    /// `None` and leave the current entry untouched.
    pub fn take_due(&self, id: AlarmId, fire_at_epoch_millis: i64) -> Option<AlarmPayload> {
        let mut entries = self.entries();
        match entries.get(&id) {
            Some(entry) if entry.fire_at_epoch_millis == fire_at_epoch_millis => {
                // The registration has been consumed; release it on the host.
                self.timer.disarm(id);
                entries.remove(&id).map(|e| e.payload)
            }
            Some(entry) => {
                tracing::debug!(
                    %id,
                    stale = fire_at_epoch_millis,
                    live = entry.fire_at_epoch_millis,
                    "ignoring stale wake"
                );
                None
            }
            None => {
                tracing::debug!(%id, "ignoring wake for unscheduled alarm");
                None
            }
        }
    }

    pub fn entry(&self, id: AlarmId) -> Option<ScheduleEntry> {
        self.entries().get(&id).cloned()
    }

    pub fn is_scheduled(&self, id: AlarmId) -> bool {
        self.entries().contains_key(&id)
    }

    /// Pending entries ordered by fire time.
    pub fn pending(&self) -> Vec<ScheduleEntry> {
        let mut list: Vec<_> = self.entries().values().cloned().collect();
        list.sort_by_key(|e| (e.fire_at_epoch_millis, e.id));
        list
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<AlarmId, ScheduleEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
