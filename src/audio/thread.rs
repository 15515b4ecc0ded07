use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::library::SessionHandles;

use super::engine::{EngineSettings, PlaybackEngine};
use super::sink::{RodioSinkFactory, SinkEvent, SinkNotifier};
use super::types::{AudioCmd, PlaybackError, PlaybackState, StateHandle};

/// How often the loop wakes up without input to check the readiness timeout.
const IDLE_TICK: Duration = Duration::from_millis(200);

/// Everything the audio thread reacts to, in arrival order.
#[derive(Debug)]
pub(super) enum AudioEvent {
    Command(AudioCmd),
    Sink(SinkEvent),
}

/// Sink construction parameters, resolved on the audio thread because the
/// output stream cannot move between threads.
pub(super) struct SinkOptions {
    pub position_tick: Duration,
    pub fetch_timeout: Duration,
}

pub(super) fn spawn_audio_thread(
    tx: Sender<AudioEvent>,
    rx: Receiver<AudioEvent>,
    state: StateHandle,
    handles: SessionHandles,
    engine_settings: EngineSettings,
    sink_options: SinkOptions,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let notify: SinkNotifier = sink_notifier(tx);
        let factory = RodioSinkFactory::new(
            notify,
            sink_options.position_tick,
            sink_options.fetch_timeout,
        );
        let engine = PlaybackEngine::new(Box::new(factory), handles, engine_settings);
        run_audio_loop(engine, rx, state);
    })
}

/// Sinks report through the same channel as user commands so both are
/// applied by one thread in order.
pub(super) fn sink_notifier(tx: Sender<AudioEvent>) -> SinkNotifier {
    Arc::new(move |event: SinkEvent| {
        let _ = tx.send(AudioEvent::Sink(event));
    })
}

/// Drive `engine` until `Quit` arrives or every sender hangs up.
pub(super) fn run_audio_loop(
    mut engine: PlaybackEngine,
    rx: Receiver<AudioEvent>,
    state: StateHandle,
) {
    let mut subscribers: Vec<Sender<PlaybackState>> = Vec::new();
    publish(&engine, &state, &mut subscribers);

    loop {
        match rx.recv_timeout(IDLE_TICK) {
            Ok(AudioEvent::Sink(event)) => engine.on_sink_event(event),
            Ok(AudioEvent::Command(AudioCmd::Subscribe(sub))) => {
                let _ = sub.send(engine.state().clone());
                subscribers.push(sub);
                continue;
            }
            Ok(AudioEvent::Command(AudioCmd::Quit { fade_out_ms })) => {
                info!("audio thread shutting down");
                engine.fade_out(Duration::from_millis(fade_out_ms));
                publish(&engine, &state, &mut subscribers);
                break;
            }
            Ok(AudioEvent::Command(cmd)) => {
                debug!(?cmd, "audio command");
                // Failures are recorded in the published state.
                let _ = apply_command(&mut engine, cmd);
            }
            Err(RecvTimeoutError::Timeout) => {
                if !engine.check_ready_timeout(Instant::now()) {
                    continue;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        publish(&engine, &state, &mut subscribers);
    }
}

fn apply_command(
    engine: &mut PlaybackEngine,
    cmd: AudioCmd,
) -> Result<(), PlaybackError> {
    match cmd {
        AudioCmd::Load(track) => {
            engine.load(track)?;
            engine.play()
        }
        AudioCmd::PlayQueue { tracks, start } => engine.play_queue(tracks, start),
        AudioCmd::Play => engine.play(),
        AudioCmd::Pause => {
            engine.pause();
            Ok(())
        }
        AudioCmd::TogglePause => engine.toggle_pause(),
        AudioCmd::Stop => {
            engine.stop();
            Ok(())
        }
        AudioCmd::Seek(seconds) => {
            engine.seek(seconds);
            Ok(())
        }
        AudioCmd::SeekBy(delta) => {
            engine.seek_by(delta);
            Ok(())
        }
        AudioCmd::SetVolume(volume) => {
            engine.set_volume(volume);
            Ok(())
        }
        AudioCmd::AdjustVolume(delta) => {
            engine.adjust_volume(delta);
            Ok(())
        }
        AudioCmd::Next => engine.next(),
        AudioCmd::Prev => engine.previous(),
        AudioCmd::SetShuffle(on) => {
            engine.set_shuffle(on);
            Ok(())
        }
        AudioCmd::ToggleShuffle => {
            engine.toggle_shuffle();
            Ok(())
        }
        AudioCmd::SetRepeatMode(mode) => {
            engine.set_repeat_mode(mode);
            Ok(())
        }
        AudioCmd::CycleRepeatMode => {
            engine.cycle_repeat_mode();
            Ok(())
        }
        // Handled by the loop itself.
        AudioCmd::Subscribe(_) | AudioCmd::Quit { .. } => Ok(()),
    }
}

fn publish(
    engine: &PlaybackEngine,
    state: &StateHandle,
    subscribers: &mut Vec<Sender<PlaybackState>>,
) {
    let snapshot = engine.state();
    if let Ok(mut shared) = state.lock() {
        if *shared == *snapshot {
            return;
        }
        *shared = snapshot.clone();
    }
    subscribers.retain(|sub| sub.send(snapshot.clone()).is_ok());
}
