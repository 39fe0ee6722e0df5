//! Console stand-ins for the audio and notification surfaces.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use quietalarm_core::alarm::{AlarmNotification, AlarmNotifier, AlarmSound, Tone};
use quietalarm_core::error::AudioError;

const TONE_EXTENSIONS: [&str; 3] = ["wav", "ogg", "mp3"];

/// Resolves tone assets on disk and logs playback.
pub struct ConsoleSound {
    tone_dir: PathBuf,
    playing: Mutex<Option<Tone>>,
}

impl ConsoleSound {
    pub fn new(tone_dir: PathBuf) -> Self {
        Self {
            tone_dir,
            playing: Mutex::new(None),
        }
    }

    fn find_asset(&self, name: &str) -> Option<PathBuf> {
        find_tone(&self.tone_dir, name)
    }
}

fn find_tone(dir: &Path, name: &str) -> Option<PathBuf> {
    TONE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

impl AlarmSound for ConsoleSound {
    fn start_loop(&self, tone: &Tone) -> Result<(), AudioError> {
        match tone {
            Tone::Asset(name) => {
                let path = self
                    .find_asset(name)
                    .ok_or_else(|| AudioError::MissingResource(name.clone()))?;
                tracing::info!(path = %path.display(), "looping alarm tone");
            }
            Tone::PlatformDefault => tracing::info!("looping default alarm tone"),
        }
        let mut playing = self
            .playing
            .lock()
            .map_err(|_| AudioError::Playback("tone state poisoned".into()))?;
        *playing = Some(tone.clone());
        Ok(())
    }

    fn stop(&self) {
        let was_playing = self
            .playing
            .lock()
            .map(|mut playing| playing.take().is_some())
            .unwrap_or(false);
        if was_playing {
            tracing::info!("alarm tone stopped");
        }
    }
}

/// Logs notifications instead of drawing them.
pub struct ConsoleNotifier;

impl AlarmNotifier for ConsoleNotifier {
    fn post(&self, notification: &AlarmNotification) {
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|a| a.label.as_str())
            .collect();
        tracing::info!(
            slot = notification.slot,
            id = %notification.alarm_id,
            title = %notification.title,
            body = %notification.body,
            actions = ?actions,
            vibrate_ms = ?notification.vibrate_pattern_ms,
            "alarm notification posted"
        );
    }

    fn dismiss(&self, slot: i32) {
        tracing::info!(slot, "alarm notification dismissed");
    }
}
