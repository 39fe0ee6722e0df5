//! In-process host adapter.
//!
//! [`TokioWakeTimer`] stands in for the platform alarm facility: each armed
//! alarm is a tokio task that sleeps until its fire time and then posts an
//! [`AlarmSignal::Wake`]. [`AlarmRuntime`] drains those signals, plus the
//! snooze/stop actions coming back from the notification surface, on a
//! single task and forwards them to the [`AlarmDeliveryController`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::delivery::{AlarmDeliveryController, DeliveryOutcome};
use super::payload::AlarmId;
use super::scheduler::WakeTimer;
use crate::clock::Clock;
use crate::error::TimerError;
use crate::events::AlarmEvent;

/// Platform callbacks delivered to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmSignal {
    /// The timer for `id` reached `fire_at_epoch_millis`.
    Wake { id: AlarmId, fire_at_epoch_millis: i64 },
    /// The user pressed the snooze action.
    Snooze { id: AlarmId },
    /// The user pressed the stop action.
    Stop { id: AlarmId },
    /// Stop processing signals.
    Shutdown,
}

/// [`WakeTimer`] backed by tokio sleeps.
pub struct TokioWakeTimer {
    handle: Handle,
    signals: UnboundedSender<AlarmSignal>,
    clock: Arc<dyn Clock>,
    allow_while_idle: bool,
    tasks: Mutex<HashMap<AlarmId, JoinHandle<()>>>,
}

impl TokioWakeTimer {
    pub fn new(
        handle: Handle,
        signals: UnboundedSender<AlarmSignal>,
        clock: Arc<dyn Clock>,
        allow_while_idle: bool,
    ) -> Self {
        Self {
            handle,
            signals,
            clock,
            allow_while_idle,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn spawn(&self, id: AlarmId, fire_at_epoch_millis: i64) {
        let delay_ms = fire_at_epoch_millis
            .saturating_sub(self.clock.now_epoch_millis())
            .max(0) as u64;
        let signals = self.signals.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            if signals
                .send(AlarmSignal::Wake {
                    id,
                    fire_at_epoch_millis,
                })
                .is_err()
            {
                tracing::debug!(%id, "alarm runtime gone, dropping wake");
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = tasks.insert(id, task) {
            previous.abort();
        }
    }

    #[cfg(test)]
    fn armed_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl WakeTimer for TokioWakeTimer {
    fn arm_exact_allow_while_idle(
        &self,
        id: AlarmId,
        fire_at_epoch_millis: i64,
    ) -> Result<(), TimerError> {
        if !self.allow_while_idle {
            return Err(TimerError::ExactWakeUnavailable);
        }
        self.spawn(id, fire_at_epoch_millis);
        Ok(())
    }

    fn arm_exact(&self, id: AlarmId, fire_at_epoch_millis: i64) {
        self.spawn(id, fire_at_epoch_millis);
    }

    fn disarm(&self, id: AlarmId) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Single-task dispatcher between platform callbacks and the controller.
pub struct AlarmRuntime {
    controller: Arc<AlarmDeliveryController>,
    signals: UnboundedReceiver<AlarmSignal>,
    events: Option<UnboundedSender<AlarmEvent>>,
}

impl AlarmRuntime {
    pub fn new(
        controller: Arc<AlarmDeliveryController>,
        signals: UnboundedReceiver<AlarmSignal>,
    ) -> Self {
        Self {
            controller,
            signals,
            events: None,
        }
    }

    /// Publish an [`AlarmEvent`] for every transition.
    pub fn with_events(mut self, events: UnboundedSender<AlarmEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Process signals until `Shutdown` or until every sender is dropped.
    ///
    /// `Shutdown` stops a ringing alarm first; pending schedules are left
    /// alone.
    pub async fn run(mut self) {
        tracing::info!("alarm runtime started");
        while let Some(signal) = self.signals.recv().await {
            if signal == AlarmSignal::Shutdown {
                if let Some(payload) = self.controller.active_payload() {
                    self.dispatch(AlarmSignal::Stop { id: payload.id });
                }
                break;
            }
            self.dispatch(signal);
        }
        tracing::info!("alarm runtime stopped");
    }

    /// Handle one signal synchronously.
    pub fn dispatch(&self, signal: AlarmSignal) {
        match signal {
            AlarmSignal::Wake {
                id,
                fire_at_epoch_millis,
            } => {
                let payload = self.controller.scheduler().entry(id).map(|e| e.payload);
                match self.controller.on_wake(id, fire_at_epoch_millis) {
                    Some(outcome) => {
                        if let Some(payload) = payload {
                            self.emit(match outcome {
                                DeliveryOutcome::Delivered => AlarmEvent::AlarmDelivered {
                                    id,
                                    category: payload.category,
                                    title: payload.title,
                                    body: payload.body,
                                    at: Utc::now(),
                                },
                                DeliveryOutcome::Suppressed => AlarmEvent::AlarmSuppressed {
                                    id,
                                    category: payload.category,
                                    at: Utc::now(),
                                },
                            });
                        }
                    }
                    None => tracing::debug!(%id, "wake ignored"),
                }
            }
            AlarmSignal::Snooze { id } => match self.controller.active_payload() {
                Some(payload) if payload.id == id => {
                    let entry = self.controller.on_snooze(&payload);
                    self.emit(AlarmEvent::AlarmSnoozed {
                        id,
                        fire_at_epoch_millis: entry.fire_at_epoch_millis,
                        at: Utc::now(),
                    });
                }
                _ => tracing::debug!(%id, "snooze for alarm that is not ringing"),
            },
            AlarmSignal::Stop { id } => match self.controller.active_payload() {
                Some(payload) if payload.id == id => {
                    self.controller.on_stop(&payload);
                    self.emit(AlarmEvent::AlarmStopped { id, at: Utc::now() });
                }
                _ => match self.controller.scheduler().entry(id) {
                    // Stopping an alarm that has not rung yet cancels it.
                    Some(entry) => {
                        self.controller.on_stop(&entry.payload);
                        self.emit(AlarmEvent::AlarmCanceled { id, at: Utc::now() });
                    }
                    None => tracing::debug!(%id, "stop for unknown alarm"),
                },
            },
            AlarmSignal::Shutdown => {}
        }
    }

    fn emit(&self, event: AlarmEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{
        AlarmCategory, AlarmNotification, AlarmNotifier, AlarmPayload, AlarmScheduler,
        AlarmSound, DeliveryOptions, Tone, WakeMode,
    };
    use crate::bridge::{Bridge, MethodCall};
    use crate::clock::SystemClock;
    use crate::error::AudioError;
    use crate::quiet_hours::QuietHoursConfig;
    use crate::storage::MemorySettingsStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct SilentSound;

    impl AlarmSound for SilentSound {
        fn start_loop(&self, _: &Tone) -> Result<(), AudioError> {
            Ok(())
        }
        fn stop(&self) {}
    }

    struct SilentNotifier;

    impl AlarmNotifier for SilentNotifier {
        fn post(&self, _: &AlarmNotification) {}
        fn dismiss(&self, _: i32) {}
    }

    fn setup(
        allow_while_idle: bool,
    ) -> (
        Arc<AlarmDeliveryController>,
        UnboundedSender<AlarmSignal>,
        UnboundedReceiver<AlarmSignal>,
    ) {
        let (controller, _, tx, rx) = setup_with_timer(allow_while_idle);
        (controller, tx, rx)
    }

    fn setup_with_timer(
        allow_while_idle: bool,
    ) -> (
        Arc<AlarmDeliveryController>,
        Arc<TokioWakeTimer>,
        UnboundedSender<AlarmSignal>,
        UnboundedReceiver<AlarmSignal>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timer = Arc::new(TokioWakeTimer::new(
            Handle::current(),
            tx.clone(),
            clock.clone(),
            allow_while_idle,
        ));
        let scheduler = Arc::new(AlarmScheduler::new(timer.clone()));
        // Quiet hours disabled, so every fire is delivered.
        let settings = Arc::new(MemorySettingsStore::new(QuietHoursConfig::default()));
        let controller = Arc::new(AlarmDeliveryController::new(
            settings,
            scheduler,
            Arc::new(SilentSound),
            Arc::new(SilentNotifier),
            clock,
            DeliveryOptions::default(),
        ));
        (controller, timer, tx, rx)
    }

    fn soon(ms: i64) -> i64 {
        Utc::now().timestamp_millis() + ms
    }

    #[tokio::test]
    async fn armed_alarm_is_delivered() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let runtime = AlarmRuntime::new(controller.clone(), rx).with_events(events_tx);
        let handle = tokio::spawn(runtime.run());

        let entry = controller.scheduler().schedule(AlarmPayload::new(
            1,
            soon(20),
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        assert_eq!(entry.mode, WakeMode::ExactAllowWhileIdle);

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, AlarmEvent::AlarmDelivered { id: AlarmId(1), .. }));

        tx.send(AlarmSignal::Stop { id: AlarmId(1) }).unwrap();
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, AlarmEvent::AlarmStopped { id: AlarmId(1), .. }));

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_ringing_alarm() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        let fire_at = soon(0);
        controller.scheduler().schedule(AlarmPayload::new(
            6,
            fire_at,
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            kinds.push(event);
        }
        // The wake may or may not have raced ahead of the shutdown.
        match kinds.as_slice() {
            [] => assert!(controller.scheduler().is_scheduled(AlarmId(6))),
            [AlarmEvent::AlarmDelivered { .. }, AlarmEvent::AlarmStopped { .. }] => {
                assert!(controller.active_payload().is_none());
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fallback_timer_still_fires() {
        let (controller, tx, rx) = setup(false);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        let entry = controller.scheduler().schedule(AlarmPayload::new(
            2,
            soon(10),
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        assert_eq!(entry.mode, WakeMode::Exact);
        assert!(matches!(
            events_rx.recv().await.unwrap(),
            AlarmEvent::AlarmDelivered { id: AlarmId(2), .. }
        ));

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn canceled_alarm_never_fires() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        controller.scheduler().schedule(AlarmPayload::new(
            3,
            soon(30),
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        controller.scheduler().cancel(AlarmId(3));

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snooze_signal_rearms_alarm() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        controller.scheduler().schedule(AlarmPayload::new(
            4,
            soon(5),
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        events_rx.recv().await.unwrap();

        tx.send(AlarmSignal::Snooze { id: AlarmId(4) }).unwrap();
        match events_rx.recv().await.unwrap() {
            AlarmEvent::AlarmSnoozed {
                id,
                fire_at_epoch_millis,
                ..
            } => {
                assert_eq!(id, AlarmId(4));
                assert!(fire_at_epoch_millis >= soon(59_000));
            }
            other => panic!("Expected AlarmSnoozed, got {other:?}"),
        }
        assert!(controller.scheduler().is_scheduled(AlarmId(4)));
        assert!(controller.active_payload().is_none());

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn far_past_fire_time_fires_immediately() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        let bridge = Bridge::new(
            Arc::new(MemorySettingsStore::default()),
            controller.scheduler().clone(),
            Arc::new(SystemClock),
        );
        bridge
            .handle(&MethodCall::new(
                "scheduleAlarm",
                json!({"id": 8, "time": i64::MIN, "title": "Late", "body": "Very"}),
            ))
            .unwrap();
        assert!(controller.scheduler().is_scheduled(AlarmId(8)));

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, AlarmEvent::AlarmDelivered { id: AlarmId(8), .. }));

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn far_future_fire_time_stays_pending() {
        let (controller, timer, tx, rx) = setup_with_timer(true);
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).run());

        controller.scheduler().schedule(AlarmPayload::new(
            9,
            i64::MAX,
            "Later",
            "Much",
            AlarmCategory::Standard,
        ));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(controller.scheduler().is_scheduled(AlarmId(9)));
        assert_eq!(timer.armed_count(), 1);

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn fired_wake_task_is_released() {
        let (controller, timer, tx, rx) = setup_with_timer(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        controller.scheduler().schedule(AlarmPayload::new(
            10,
            soon(5),
            "Wake",
            "Now",
            AlarmCategory::Standard,
        ));
        assert_eq!(timer.armed_count(), 1);

        events_rx.recv().await.unwrap();
        assert_eq!(timer.armed_count(), 0);

        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stopping_pending_alarm_publishes_cancel() {
        let (controller, tx, rx) = setup(true);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(AlarmRuntime::new(controller.clone(), rx).with_events(events_tx).run());

        controller.scheduler().schedule(AlarmPayload::new(
            11,
            soon(60_000),
            "Wake",
            "Later",
            AlarmCategory::Standard,
        ));
        tx.send(AlarmSignal::Stop { id: AlarmId(11) }).unwrap();
        assert!(matches!(
            events_rx.recv().await.unwrap(),
            AlarmEvent::AlarmCanceled { id: AlarmId(11), .. }
        ));
        assert!(!controller.scheduler().is_scheduled(AlarmId(11)));

        // Unknown ids produce nothing.
        tx.send(AlarmSignal::Stop { id: AlarmId(12) }).unwrap();
        tx.send(AlarmSignal::Shutdown).unwrap();
        handle.await.unwrap();
        assert!(events_rx.try_recv().is_err());
    }
}
