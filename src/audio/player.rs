use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Settings;
use crate::library::SessionHandles;

use super::engine::EngineSettings;
use super::thread::{spawn_audio_thread, AudioEvent, SinkOptions};
use super::types::{AudioCmd, PlaybackState, StateHandle};

/// Front-end handle to the audio thread.
pub struct AudioPlayer {
    tx: Sender<AudioEvent>,
    state: StateHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    pub fn new(handles: SessionHandles, settings: &Settings) -> Self {
        let (tx, rx) = mpsc::channel::<AudioEvent>();
        let state: StateHandle = Arc::new(Mutex::new(PlaybackState::default()));

        let audio = &settings.audio;
        let engine_settings = EngineSettings {
            initial_volume: audio.volume,
            ready_timeout: (audio.ready_timeout_ms > 0)
                .then(|| Duration::from_millis(audio.ready_timeout_ms)),
            shuffle: settings.playback.shuffle,
            repeat_mode: settings.playback.repeat_mode.into(),
        };
        let sink_options = SinkOptions {
            position_tick: Duration::from_millis(audio.position_tick_ms),
            fetch_timeout: Duration::from_secs(settings.catalog.timeout_secs.max(1)),
        };

        let audio_handle = spawn_audio_thread(
            tx.clone(),
            rx,
            state.clone(),
            handles,
            engine_settings,
            sink_options,
        );

        Self {
            tx,
            state,
            join: Mutex::new(Some(audio_handle)),
        }
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn send(&self, cmd: AudioCmd) -> Result<(), mpsc::SendError<AudioCmd>> {
        self.tx.send(AudioEvent::Command(cmd)).map_err(|e| match e.0 {
            AudioEvent::Command(cmd) => mpsc::SendError(cmd),
            AudioEvent::Sink(_) => mpsc::SendError(AudioCmd::Stop),
        })
    }

    /// Receive every state change from now on, starting with the current state.
    pub fn subscribe(&self) -> Option<Receiver<PlaybackState>> {
        let (tx, rx) = mpsc::channel();
        self.send(AudioCmd::Subscribe(tx)).ok()?;
        Some(rx)
    }

    pub fn quit_softly(&self, fade_out: Duration) {
        let _ = self.send(AudioCmd::Quit {
            fade_out_ms: fade_out.as_millis() as u64,
        });

        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}
