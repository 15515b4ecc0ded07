use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::library::Track;

/// Phase of the transport state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Empty,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Errored,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::Empty => "stopped",
            Transport::Loading => "loading",
            Transport::Ready => "ready",
            Transport::Playing => "playing",
            Transport::Paused => "paused",
            Transport::Ended => "ended",
            Transport::Errored => "error",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    Off,
    /// Wrap around to the start of the queue.
    All,
    /// Replay the current track when it ends.
    One,
}

impl RepeatMode {
    /// Cycle `Off -> All -> One -> Off`.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Errors reported by the playback engine. None of them are fatal: the engine
/// always accepts a fresh `load` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("source unavailable for track {track_id}: {reason}")]
    SourceUnavailable { track_id: String, reason: String },
    #[error("playback failed for track {track_id}: {message}")]
    SinkPlaybackError { track_id: String, message: String },
    #[error("no track loaded")]
    NoTrackLoaded,
    #[error("track {track_id} is not playable; load it again")]
    NotPlayable { track_id: String },
    #[error("queue index {index} out of range (queue has {len} tracks)")]
    InvalidQueueIndex { index: usize, len: usize },
}

/// The single process-wide playback state, owned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub transport: Transport,
    pub position_seconds: f64,
    pub volume: f32,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub queue: Vec<Track>,
    pub queue_cursor: Option<usize>,
    pub last_error: Option<PlaybackError>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            transport: Transport::Empty,
            position_seconds: 0.0,
            volume: 1.0,
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            queue: Vec::new(),
            queue_cursor: None,
            last_error: None,
        }
    }
}

impl PlaybackState {
    pub fn duration_seconds(&self) -> f64 {
        self.current_track
            .as_ref()
            .map(|t| t.duration_seconds)
            .unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }
}

/// Latest published state, shared with the UI.
pub type StateHandle = Arc<Mutex<PlaybackState>>;

#[derive(Debug)]
pub enum AudioCmd {
    /// Load a single track outside the queue and start it.
    Load(Track),
    /// Replace the queue and start playing at `start`.
    PlayQueue { tracks: Vec<Track>, start: usize },
    Play,
    Pause,
    TogglePause,
    Stop,
    Seek(f64),
    SeekBy(f64),
    SetVolume(f32),
    AdjustVolume(f32),
    Next,
    Prev,
    SetShuffle(bool),
    ToggleShuffle,
    SetRepeatMode(RepeatMode),
    CycleRepeatMode,
    /// Receive a copy of the state after every change.
    Subscribe(std::sync::mpsc::Sender<PlaybackState>),
    Quit { fade_out_ms: u64 },
}
