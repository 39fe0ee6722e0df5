//! In-process alarm host shared by `alarm run` and `call`.
//!
//! Owns the engine wiring (settings, scheduler, controller, bridge) and a
//! serve loop that prints every [`AlarmEvent`] as one JSON line on stdout
//! while reading commands from stdin:
//!
//! - `snooze [id]` / `stop [id]`: the notification actions
//! - `quit`: leave immediately
//! - a JSON object: a bridge method call, e.g.
//!   `{"method":"getQuietHours"}`
//!
//! Once stdin is closed the loop keeps running until no alarm is pending.
//! An alarm still ringing at that point is stopped, since nobody is left to
//! press its buttons.

use std::error::Error;
use std::sync::Arc;

use quietalarm_core::alarm::{AlarmSignal, DeliveryOptions, TokioWakeTimer};
use quietalarm_core::{
    AlarmDeliveryController, AlarmEvent, AlarmId, AlarmRuntime, AlarmScheduler, Bridge, Clock,
    EngineConfig, MethodCall, SettingsStore, SqliteSettingsStore, SystemClock,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::surfaces::{ConsoleNotifier, ConsoleSound};

pub struct Host {
    pub controller: Arc<AlarmDeliveryController>,
    pub bridge: Bridge,
    signals: UnboundedSender<AlarmSignal>,
    receiver: UnboundedReceiver<AlarmSignal>,
    events_tx: UnboundedSender<AlarmEvent>,
    events_rx: UnboundedReceiver<AlarmEvent>,
}

/// What a stdin line asked for.
#[derive(Debug, PartialEq)]
enum Command {
    Snooze(Option<AlarmId>),
    Stop(Option<AlarmId>),
    Quit,
    Call(MethodCall),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(Command::Call)
            .map_err(|e| format!("invalid method call: {e}"));
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let id = match words.next() {
        Some(raw) => Some(AlarmId(
            raw.parse()
                .map_err(|_| format!("invalid alarm id: {raw}"))?,
        )),
        None => None,
    };
    match verb {
        "snooze" => Ok(Command::Snooze(id)),
        "stop" => Ok(Command::Stop(id)),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

impl Host {
    /// Wire the engine against the on-disk settings and config.
    pub fn open(handle: Handle) -> Result<Self, Box<dyn Error>> {
        let config = EngineConfig::load_or_default();
        let settings: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::open()?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (signals, receiver) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let timer = Arc::new(TokioWakeTimer::new(
            handle,
            signals.clone(),
            clock.clone(),
            config.timer.exact_while_idle,
        ));
        let scheduler = Arc::new(AlarmScheduler::new(timer));
        let controller = Arc::new(AlarmDeliveryController::new(
            settings.clone(),
            scheduler.clone(),
            Arc::new(ConsoleSound::new(config.tone_dir()?)),
            Arc::new(ConsoleNotifier),
            clock.clone(),
            DeliveryOptions::from(&config),
        ));
        let bridge = Bridge::new(settings, scheduler, clock).with_events(events_tx.clone());

        Ok(Self {
            controller,
            bridge,
            signals,
            receiver,
            events_tx,
            events_rx,
        })
    }

    /// Run the alarm runtime until `quit`, or until stdin is closed and
    /// nothing is pending.
    pub async fn serve(self) -> Result<(), Box<dyn Error>> {
        let Host {
            controller,
            bridge,
            signals,
            receiver,
            events_tx,
            mut events_rx,
        } = self;

        let runtime = tokio::spawn(
            AlarmRuntime::new(controller.clone(), receiver)
                .with_events(events_tx)
                .run(),
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            if !stdin_open && controller.scheduler().pending().is_empty() {
                break;
            }

            tokio::select! {
                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line? else {
                        tracing::debug!("stdin closed");
                        stdin_open = false;
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(Command::Quit) => break,
                        Ok(Command::Snooze(id)) => {
                            match id.or_else(|| controller.active_payload().map(|p| p.id)) {
                                Some(id) => signals.send(AlarmSignal::Snooze { id })?,
                                None => eprintln!("error: no alarm is ringing"),
                            }
                        }
                        Ok(Command::Stop(id)) => {
                            match id.or_else(|| controller.active_payload().map(|p| p.id)) {
                                Some(id) => signals.send(AlarmSignal::Stop { id })?,
                                None => eprintln!("error: no alarm is ringing"),
                            }
                        }
                        Ok(Command::Call(call)) => match bridge.handle(&call) {
                            Ok(reply) => print_json(&json!({ "reply": reply }))?,
                            Err(e) => print_json(&json!({ "error": e.to_string() }))?,
                        },
                        Err(e) => eprintln!("error: {e}"),
                    }
                }
                Some(event) = events_rx.recv() => print_json(&event)?,
                else => break,
            }
        }

        signals.send(AlarmSignal::Shutdown)?;
        runtime.await?;
        drop(signals);

        while let Ok(event) = events_rx.try_recv() {
            print_json::<AlarmEvent>(&event)?;
        }
        Ok(())
    }
}
