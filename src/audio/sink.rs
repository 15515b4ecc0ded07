//! Audio sinks: the output resource bound to one playable source at a time.
//!
//! The engine talks to sinks through [`AudioSink`] and creates them through a
//! [`SinkFactory`]. Sinks report back only through generation-tagged
//! [`SinkEvent`]s so callbacks from a superseded sink can be told apart.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::library::ResolvedSource;

/// Monotonic tag distinguishing a sink from all of its predecessors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEventKind {
    /// The source is open and decodable; playback may start.
    Ready,
    /// Current position in seconds.
    Position(f64),
    /// The source played to the end.
    Ended,
    /// Opening or playing the source failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkEvent {
    pub generation: Generation,
    pub kind: SinkEventKind,
}

/// Where sinks deliver their events.
pub type SinkNotifier = Arc<dyn Fn(SinkEvent) + Send + Sync>;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no audio output device: {0}")]
    NoOutputDevice(String),
    #[error("could not open sink: {0}")]
    Open(String),
}

/// One live output. Dropping it disposes it: no events are emitted afterwards.
pub trait AudioSink {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position_seconds: f64);
    fn set_volume(&mut self, volume: f32);
}

pub trait SinkFactory {
    /// Construct a sink for `source`. Readiness is reported asynchronously via
    /// a `Ready` (or `Failed`) event tagged with `generation`.
    fn open(
        &mut self,
        source: ResolvedSource,
        generation: Generation,
    ) -> Result<Box<dyn AudioSink>, SinkError>;
}

/// `rodio`-backed sinks sharing one output stream.
pub struct RodioSinkFactory {
    stream: Result<OutputStream, String>,
    notify: SinkNotifier,
    tick: Duration,
    http: reqwest::blocking::Client,
}

impl RodioSinkFactory {
    pub fn new(notify: SinkNotifier, tick: Duration, fetch_timeout: Duration) -> Self {
        let stream = match OutputStreamBuilder::open_default_stream() {
            Ok(mut stream) => {
                // rodio logs to stderr when the stream is dropped; that would
                // scribble over the terminal UI.
                stream.log_on_drop(false);
                Ok(stream)
            }
            Err(e) => {
                error!("no audio output device: {e}");
                Err(e.to_string())
            }
        };

        let http = reqwest::blocking::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default HTTP client: {e}");
                reqwest::blocking::Client::new()
            });

        Self {
            stream,
            notify,
            tick: tick.max(Duration::from_millis(10)),
            http,
        }
    }
}

impl SinkFactory for RodioSinkFactory {
    fn open(
        &mut self,
        source: ResolvedSource,
        generation: Generation,
    ) -> Result<Box<dyn AudioSink>, SinkError> {
        let stream = self
            .stream
            .as_ref()
            .map_err(|e| SinkError::NoOutputDevice(e.clone()))?;

        let sink = Arc::new(Sink::connect_new(stream.mixer()));
        sink.pause();
        let stopped = Arc::new(AtomicBool::new(false));

        let worker = SinkWorker {
            sink: sink.clone(),
            stopped: stopped.clone(),
            generation,
            notify: self.notify.clone(),
            tick: self.tick,
            http: self.http.clone(),
        };
        thread::Builder::new()
            .name(format!("sink-{}", generation.0))
            .spawn(move || worker.run(source))
            .map_err(|e| SinkError::Open(e.to_string()))?;

        Ok(Box::new(RodioSink { sink, stopped }))
    }
}

struct RodioSink {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl AudioSink for RodioSink {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position_seconds: f64) {
        let target = Duration::from_secs_f64(position_seconds.max(0.0));
        if let Err(e) = self.sink.try_seek(target) {
            warn!("seek to {position_seconds:.1}s failed: {e}");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.sink.stop();
    }
}

/// Loads the source for one sink, then reports position until it drains.
struct SinkWorker {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
    generation: Generation,
    notify: SinkNotifier,
    tick: Duration,
    http: reqwest::blocking::Client,
}

impl SinkWorker {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn emit(&self, kind: SinkEventKind) {
        if self.is_stopped() {
            return;
        }
        (self.notify)(SinkEvent {
            generation: self.generation,
            kind,
        });
    }

    fn run(self, source: ResolvedSource) {
        if let Err(msg) = self.append(&source) {
            self.emit(SinkEventKind::Failed(msg));
            return;
        }
        self.emit(SinkEventKind::Ready);

        loop {
            thread::sleep(self.tick);
            if self.is_stopped() {
                break;
            }
            if self.sink.empty() {
                self.emit(SinkEventKind::Ended);
                break;
            }
            if !self.sink.is_paused() {
                self.emit(SinkEventKind::Position(self.sink.get_pos().as_secs_f64()));
            }
        }
        debug!(generation = self.generation.0, "sink worker finished");
    }

    fn append(&self, source: &ResolvedSource) -> Result<(), String> {
        match source {
            ResolvedSource::File(path) => {
                let file = File::open(path)
                    .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
                let decoder = Decoder::new(BufReader::new(file))
                    .map_err(|e| format!("failed to decode {}: {e}", path.display()))?;
                if !self.is_stopped() {
                    self.sink.append(decoder);
                }
            }
            ResolvedSource::Url(url) => {
                let bytes = self
                    .http
                    .get(url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .and_then(|r| r.bytes())
                    .map_err(|e| format!("failed to fetch {url}: {e}"))?;
                let decoder = Decoder::new(Cursor::new(bytes.to_vec()))
                    .map_err(|e| format!("failed to decode {url}: {e}"))?;
                if !self.is_stopped() {
                    self.sink.append(decoder);
                }
            }
        }
        Ok(())
    }
}
