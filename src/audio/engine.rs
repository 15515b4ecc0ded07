//! The playback engine: the single writer of [`PlaybackState`].
//!
//! Every mutation happens through a method on [`PlaybackEngine`], called from
//! one thread. User commands and sink events are therefore serialized, and a
//! sink event is only honored if it carries the generation of the sink that is
//! currently attached.

use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::library::{SessionHandles, Track};

use super::queue::{self, QueueDecision, QueueView, Trigger};
use super::sink::{AudioSink, Generation, SinkEvent, SinkEventKind, SinkFactory};
use super::types::{PlaybackError, PlaybackState, RepeatMode, Transport};

/// Knobs the engine takes from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub initial_volume: f32,
    /// How long a sink may stay in `Loading` before the load is abandoned.
    /// `None` waits forever.
    pub ready_timeout: Option<Duration>,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            ready_timeout: Some(Duration::from_secs(10)),
            shuffle: false,
            repeat_mode: RepeatMode::Off,
        }
    }
}

struct ActiveSink {
    generation: Generation,
    sink: Box<dyn AudioSink>,
}

pub struct PlaybackEngine {
    state: PlaybackState,
    factory: Box<dyn SinkFactory>,
    handles: SessionHandles,
    active: Option<ActiveSink>,
    generation: Generation,
    /// Start playback as soon as the loading sink reports ready.
    play_when_ready: bool,
    /// Seek requested while loading; applied on ready.
    pending_seek: Option<f64>,
    loading_since: Option<Instant>,
    ready_timeout: Option<Duration>,
    /// Queue indices visited during the current shuffle pass.
    history: Vec<usize>,
    rng: StdRng,
}

impl PlaybackEngine {
    pub fn new(
        factory: Box<dyn SinkFactory>,
        handles: SessionHandles,
        settings: EngineSettings,
    ) -> Self {
        Self::with_rng(factory, handles, settings, StdRng::from_entropy())
    }

    pub fn with_rng(
        factory: Box<dyn SinkFactory>,
        handles: SessionHandles,
        settings: EngineSettings,
        rng: StdRng,
    ) -> Self {
        let state = PlaybackState {
            volume: clamp_volume(settings.initial_volume).unwrap_or(1.0),
            shuffle: settings.shuffle,
            repeat_mode: settings.repeat_mode,
            ..PlaybackState::default()
        };
        Self {
            state,
            factory,
            handles,
            active: None,
            generation: Generation::default(),
            play_when_ready: false,
            pending_seek: None,
            loading_since: None,
            ready_timeout: settings.ready_timeout,
            history: Vec::new(),
            rng,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Generation of the most recently created sink.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Attach a sink for `track`; it reaches `Ready` but does not start unless
    /// `play` is called. If the track is part of the queue the cursor follows
    /// it; otherwise it plays outside the queue.
    pub fn load(&mut self, track: Track) -> Result<(), PlaybackError> {
        self.load_at(track, Instant::now())
    }

    pub fn load_at(&mut self, track: Track, now: Instant) -> Result<(), PlaybackError> {
        let cursor = self.state.queue.iter().position(|t| t.id == track.id);
        self.state.queue_cursor = cursor;
        self.history = cursor.into_iter().collect();
        self.begin_load(track, now)
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let Some(track_id) = self.state.current_track.as_ref().map(|t| t.id.clone()) else {
            return Err(self.report(PlaybackError::NoTrackLoaded));
        };
        match self.state.transport {
            Transport::Playing => {}
            Transport::Loading => self.play_when_ready = true,
            Transport::Ready | Transport::Paused => self.start(),
            Transport::Ended => {
                self.state.position_seconds = 0.0;
                if let Some(active) = self.active.as_mut() {
                    active.sink.seek(0.0);
                }
                self.start();
            }
            Transport::Errored => {
                return Err(self.report(PlaybackError::NotPlayable { track_id }));
            }
            Transport::Empty => return Err(self.report(PlaybackError::NoTrackLoaded)),
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        match self.state.transport {
            Transport::Playing => {
                if let Some(active) = self.active.as_mut() {
                    active.sink.pause();
                }
                self.state.transport = Transport::Paused;
            }
            Transport::Loading => self.play_when_ready = false,
            _ => {}
        }
    }

    pub fn toggle_pause(&mut self) -> Result<(), PlaybackError> {
        if self.state.transport == Transport::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Dispose the sink and clear the current track. The queue is kept.
    pub fn stop(&mut self) {
        self.teardown();
        self.state.current_track = None;
        self.state.transport = Transport::Empty;
        self.state.position_seconds = 0.0;
        self.state.queue_cursor = None;
        self.history.clear();
    }

    /// Jump to `seconds`, clamped into the current track.
    pub fn seek(&mut self, seconds: f64) {
        if self.state.current_track.is_none() {
            debug!("seek ignored: nothing loaded");
            return;
        }
        let target = clamp_position(seconds, self.state.duration_seconds());
        self.state.position_seconds = target;
        match self.state.transport {
            Transport::Loading => self.pending_seek = Some(target),
            Transport::Errored => {}
            _ => {
                if let Some(active) = self.active.as_mut() {
                    active.sink.seek(target);
                }
            }
        }
    }

    pub fn seek_by(&mut self, delta_seconds: f64) {
        if delta_seconds.is_nan() {
            return;
        }
        self.seek(self.state.position_seconds + delta_seconds);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let Some(volume) = clamp_volume(volume) else {
            debug!("ignoring non-numeric volume");
            return;
        };
        self.state.volume = volume;
        if let Some(active) = self.active.as_mut() {
            active.sink.set_volume(volume);
        }
    }

    pub fn adjust_volume(&mut self, delta: f32) {
        self.set_volume(self.state.volume + delta);
    }

    /// Apply an event reported by a sink. Events from any sink other than the
    /// attached one are dropped.
    pub fn on_sink_event(&mut self, event: SinkEvent) {
        let attached = self.active.as_ref().map(|a| a.generation);
        if attached != Some(event.generation) {
            debug!(
                generation = event.generation.0,
                current = self.generation.0,
                "dropping stale sink event"
            );
            return;
        }

        match event.kind {
            SinkEventKind::Ready => self.on_ready(),
            SinkEventKind::Position(seconds) => {
                if self.state.transport == Transport::Playing {
                    self.state.position_seconds =
                        clamp_position(seconds, self.state.duration_seconds());
                }
            }
            SinkEventKind::Ended => self.on_ended(),
            SinkEventKind::Failed(message) => {
                let track_id = self.current_track_id();
                let err = if self.state.transport == Transport::Loading {
                    PlaybackError::SourceUnavailable {
                        track_id,
                        reason: message,
                    }
                } else {
                    PlaybackError::SinkPlaybackError { track_id, message }
                };
                self.fail(err);
            }
        }
    }

    /// Abandon a load that has not become ready within the configured timeout.
    /// Returns `true` if the load was abandoned.
    pub fn check_ready_timeout(&mut self, now: Instant) -> bool {
        let (Some(timeout), Some(since)) = (self.ready_timeout, self.loading_since) else {
            return false;
        };
        if self.state.transport != Transport::Loading || now.duration_since(since) < timeout {
            return false;
        }
        let track_id = self.current_track_id();
        self.fail(PlaybackError::SourceUnavailable {
            track_id,
            reason: format!("not ready after {} ms", timeout.as_millis()),
        });
        true
    }

    /// Replace the queue. `cursor` is kept only if it points into the new queue.
    pub fn set_queue(&mut self, tracks: Vec<Track>, cursor: Option<usize>) {
        let cursor = cursor.filter(|&c| c < tracks.len());
        self.state.queue = tracks;
        self.state.queue_cursor = cursor;
        self.history = cursor.into_iter().collect();
    }

    pub fn play_queue_at(&mut self, index: usize) -> Result<(), PlaybackError> {
        let len = self.state.queue.len();
        if index >= len {
            return Err(self.report(PlaybackError::InvalidQueueIndex { index, len }));
        }
        self.history.clear();
        self.load_cursor(index)
    }

    pub fn play_queue(&mut self, tracks: Vec<Track>, start: usize) -> Result<(), PlaybackError> {
        self.set_queue(tracks, None);
        self.play_queue_at(start)
    }

    pub fn next(&mut self) -> Result<(), PlaybackError> {
        self.advance(Trigger::UserNext)
    }

    pub fn previous(&mut self) -> Result<(), PlaybackError> {
        self.advance(Trigger::UserPrevious)
    }

    pub fn set_shuffle(&mut self, on: bool) {
        self.state.shuffle = on;
        // A new shuffle pass starts from whatever is playing now.
        self.history = self.state.queue_cursor.into_iter().collect();
    }

    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(!self.state.shuffle);
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.state.repeat_mode = mode;
    }

    pub fn cycle_repeat_mode(&mut self) {
        self.set_repeat_mode(self.state.repeat_mode.cycled());
    }

    /// Ramp the volume down over `duration`, then dispose the sink. Blocks the
    /// calling thread.
    pub fn fade_out(&mut self, duration: Duration) {
        if self.state.transport == Transport::Playing {
            if let Some(active) = self.active.as_mut() {
                let steps: u32 = 20;
                let step = (duration / steps).max(Duration::from_millis(1));
                let start = self.state.volume;
                if !duration.is_zero() {
                    for i in 1..=steps {
                        let t = i as f32 / steps as f32;
                        active.sink.set_volume(start * (1.0 - t));
                        thread::sleep(step);
                    }
                }
                active.sink.set_volume(0.0);
            }
        }
        self.teardown();
        if self.state.current_track.is_some() {
            self.state.transport = Transport::Paused;
        }
    }

    fn advance(&mut self, trigger: Trigger) -> Result<(), PlaybackError> {
        let view = QueueView {
            len: self.state.queue.len(),
            cursor: self.state.queue_cursor,
            shuffle: self.state.shuffle,
            repeat: self.state.repeat_mode,
            position_seconds: self.state.position_seconds,
            history: &self.history,
        };
        let decision = queue::decide(&view, trigger, &mut self.rng);
        debug!(?trigger, ?decision, "queue navigation");

        match decision {
            QueueDecision::Load { cursor, new_cycle } => {
                if new_cycle {
                    self.history.clear();
                }
                if trigger == Trigger::UserPrevious {
                    if let Some(pos) = self.history.iter().rposition(|&i| i == cursor) {
                        self.history.truncate(pos);
                    }
                }
                self.load_cursor(cursor)
            }
            QueueDecision::Replay => {
                let Some(track) = self.state.current_track.clone() else {
                    self.stop();
                    return Ok(());
                };
                self.begin_load(track, Instant::now())?;
                self.play_when_ready = true;
                Ok(())
            }
            QueueDecision::Restart => {
                self.seek(0.0);
                Ok(())
            }
            QueueDecision::Stop => {
                info!("queue exhausted");
                self.stop();
                Ok(())
            }
        }
    }

    fn load_cursor(&mut self, cursor: usize) -> Result<(), PlaybackError> {
        let Some(track) = self.state.queue.get(cursor).cloned() else {
            let len = self.state.queue.len();
            return Err(self.report(PlaybackError::InvalidQueueIndex { index: cursor, len }));
        };
        self.state.queue_cursor = Some(cursor);
        if self.history.last() != Some(&cursor) {
            self.history.push(cursor);
        }
        self.begin_load(track, Instant::now())?;
        self.play_when_ready = true;
        Ok(())
    }

    /// Dispose the current sink and attach a new one for `track`.
    fn begin_load(&mut self, track: Track, now: Instant) -> Result<(), PlaybackError> {
        self.teardown();
        self.generation = self.generation.next();
        self.state.position_seconds = 0.0;
        self.state.last_error = None;

        let track_id = track.id.clone();
        let resolved = self.handles.resolve(&track.playable);
        info!(track = %track.display(), generation = self.generation.0, "loading");
        self.state.current_track = Some(track);

        let source = match resolved {
            Ok(source) => source,
            Err(e) => {
                return Err(self.fail(PlaybackError::SourceUnavailable {
                    track_id,
                    reason: e.to_string(),
                }));
            }
        };

        match self.factory.open(source, self.generation) {
            Ok(mut sink) => {
                sink.set_volume(self.state.volume);
                self.active = Some(ActiveSink {
                    generation: self.generation,
                    sink,
                });
                self.state.transport = Transport::Loading;
                self.loading_since = Some(now);
                Ok(())
            }
            Err(e) => Err(self.fail(PlaybackError::SourceUnavailable {
                track_id,
                reason: e.to_string(),
            })),
        }
    }

    fn on_ready(&mut self) {
        if self.state.transport != Transport::Loading {
            return;
        }
        self.loading_since = None;
        self.state.transport = Transport::Ready;
        self.state.position_seconds = 0.0;
        if let Some(target) = self.pending_seek.take() {
            self.state.position_seconds = target;
            if let Some(active) = self.active.as_mut() {
                active.sink.seek(target);
            }
        }
        if std::mem::take(&mut self.play_when_ready) {
            self.start();
        }
    }

    fn on_ended(&mut self) {
        if !matches!(
            self.state.transport,
            Transport::Playing | Transport::Paused | Transport::Ready
        ) {
            return;
        }
        self.state.transport = Transport::Ended;
        self.state.position_seconds = self.state.duration_seconds();
        // Errors from the next load are already recorded in the state.
        let _ = self.advance(Trigger::Ended);
    }

    fn start(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.sink.play();
            self.state.transport = Transport::Playing;
        }
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(generation = active.generation.0, "disposing sink");
        }
        self.play_when_ready = false;
        self.pending_seek = None;
        self.loading_since = None;
    }

    /// Drop to `Errored`, keeping the track so the user can see what failed.
    fn fail(&mut self, err: PlaybackError) -> PlaybackError {
        self.teardown();
        self.state.transport = Transport::Errored;
        self.report(err)
    }

    fn report(&mut self, err: PlaybackError) -> PlaybackError {
        warn!("{err}");
        self.state.last_error = Some(err.clone());
        err
    }

    fn current_track_id(&self) -> String {
        self.state
            .current_track
            .as_ref()
            .map(|t| t.id.clone())
            .unwrap_or_default()
    }
}

/// Clamp into `[0, duration]`; NaN maps to 0.
fn clamp_position(seconds: f64, duration: f64) -> f64 {
    let duration = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    };
    if seconds.is_nan() {
        return 0.0;
    }
    seconds.clamp(0.0, duration)
}

/// Clamp into `[0, 1]`; NaN is rejected.
fn clamp_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}
