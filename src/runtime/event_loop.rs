use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::App;
use crate::audio::{AudioCmd, AudioPlayer, PlaybackState, Transport};
use crate::config;
use crate::library::TrackSource;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::ui;

use super::startup::LibrarySession;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// State tracked by the runtime event loop across iterations.
#[derive(Debug, Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
}

/// What a key press asks of the loop.
#[derive(Debug)]
pub enum KeyOutcome {
    Continue,
    Audio(AudioCmd),
    Control(ControlCmd),
    /// Remove the track with this id from the persisted library.
    Forget(String),
    Quit,
}

/// Main terminal event loop: input, drawing, and keeping the model and MPRIS
/// in step with the audio thread. Returns `Ok(())` when shutdown is requested.
#[allow(clippy::too_many_arguments)]
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    library: &mut LibrarySession,
    audio_player: &AudioPlayer,
    updates: Option<&mpsc::Receiver<PlaybackState>>,
    mpris: &MprisHandle,
    control_tx: &mpsc::Sender<ControlCmd>,
    control_rx: &mpsc::Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    let quit = || audio_player.quit_softly(Duration::from_millis(settings.audio.quit_fade_out_ms));

    loop {
        // Auto-advance and media keys change playback without a key press here.
        let latest = match updates {
            Some(rx) => rx.try_iter().last(),
            None => Some(audio_player.snapshot()),
        };
        if let Some(snapshot) = latest.filter(|s| *s != app.playback) {
            mpris.update(&snapshot);
            app.set_playback(snapshot);
        }

        let display = app.display_indices();
        terminal.draw(|f| ui::draw(f, app, &display, &settings.audio))?;

        while let Ok(cmd) = control_rx.try_recv() {
            if cmd == ControlCmd::Quit {
                quit();
                return Ok(());
            }
            if let Some(audio_cmd) = control_to_audio(&cmd, app) {
                send(audio_player, audio_cmd, app);
            }
        }

        if event::poll(INPUT_POLL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key_event(key, &settings.audio, app, state) {
                    KeyOutcome::Continue => {}
                    KeyOutcome::Audio(cmd) => send(audio_player, cmd, app),
                    KeyOutcome::Control(cmd) => {
                        let _ = control_tx.send(cmd);
                    }
                    KeyOutcome::Forget(id) => forget(library, app, &id),
                    KeyOutcome::Quit => {
                        quit();
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn send(audio_player: &AudioPlayer, cmd: AudioCmd, app: &mut App) {
    if matches!(cmd, AudioCmd::PlayQueue { .. } | AudioCmd::Next | AudioCmd::Prev) && !app.filter_mode {
        app.follow_playback_on();
    }
    if let Err(e) = audio_player.send(cmd) {
        debug!("audio thread gone, dropping {:?}", e.0);
        app.set_status("audio output stopped");
    }
}

fn forget(library: &mut LibrarySession, app: &mut App, id: &str) {
    match library.remove(id) {
        Ok(true) => {
            if let Some(track) = app.remove_track(id) {
                app.set_status(format!("removed {} from library", track.display()));
            }
        }
        Ok(false) => app.set_status("not in the saved library"),
        Err(e) => app.set_status(format!("remove failed: {e}")),
    }
}

/// Translate a bus request into an engine command. Starting from nothing
/// plays the visible list from the selection.
pub fn control_to_audio(cmd: &ControlCmd, app: &App) -> Option<AudioCmd> {
    let from_selection = || {
        app.queue_from_selection()
            .map(|(tracks, start)| AudioCmd::PlayQueue { tracks, start })
    };
    let idle = matches!(
        app.playback.transport,
        Transport::Empty | Transport::Errored
    );

    match cmd {
        ControlCmd::Quit => None,
        ControlCmd::Play if idle => from_selection(),
        ControlCmd::Play => Some(AudioCmd::Play),
        ControlCmd::Pause => Some(AudioCmd::Pause),
        ControlCmd::PlayPause if idle => from_selection(),
        ControlCmd::PlayPause => Some(AudioCmd::TogglePause),
        ControlCmd::Stop => Some(AudioCmd::Stop),
        ControlCmd::Next => Some(AudioCmd::Next),
        ControlCmd::Prev => Some(AudioCmd::Prev),
        ControlCmd::SetShuffle(on) => Some(AudioCmd::SetShuffle(*on)),
        ControlCmd::SetLoop(mode) => Some(AudioCmd::SetRepeatMode(*mode)),
        ControlCmd::SetVolume(v) => Some(AudioCmd::SetVolume(*v as f32)),
    }
}

/// Apply a key press to the model and say what else should happen.
pub fn handle_key_event(
    key: KeyEvent,
    audio: &config::AudioSettings,
    app: &mut App,
    state: &mut EventLoopState,
) -> KeyOutcome {
    if app.filter_mode {
        state.pending_gg = false;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => app.clear_filter(),
            KeyCode::Backspace => app.pop_filter_char(),
            KeyCode::Char('j' | 'n') if ctrl => app.next(),
            KeyCode::Char('k' | 'p') if ctrl => app.prev(),
            KeyCode::Char(c) if !c.is_control() => app.push_filter_char(c),
            KeyCode::Enter => {
                let Some((tracks, start)) = app.queue_from_selection() else {
                    return KeyOutcome::Continue;
                };
                app.exit_filter_mode();
                return KeyOutcome::Audio(AudioCmd::PlayQueue { tracks, start });
            }
            _ => {}
        }
        return KeyOutcome::Continue;
    }

    // Any key other than a second `g` cancels the prefix.
    let was_pending_gg = std::mem::take(&mut state.pending_gg);

    match key.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Char('/') => app.enter_filter_mode(),
        KeyCode::Char('g') => {
            if was_pending_gg {
                app.follow_playback_off();
                app.select_first();
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => {
            app.follow_playback_off();
            app.select_last();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_playback_off();
            app.next();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_playback_off();
            app.prev();
        }
        KeyCode::Enter => {
            let playing_selected = app.playback.is_playing()
                && app.now_playing_index() == Some(app.selected);
            if !playing_selected {
                if let Some((tracks, start)) = app.queue_from_selection() {
                    return KeyOutcome::Audio(AudioCmd::PlayQueue { tracks, start });
                }
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            return KeyOutcome::Control(ControlCmd::PlayPause);
        }
        KeyCode::Char('l') => return KeyOutcome::Control(ControlCmd::Next),
        KeyCode::Char('h') => return KeyOutcome::Control(ControlCmd::Prev),
        KeyCode::Char('x') => return KeyOutcome::Control(ControlCmd::Stop),
        KeyCode::Char('L') | KeyCode::Right => {
            return KeyOutcome::Audio(AudioCmd::SeekBy(audio.seek_step_seconds));
        }
        KeyCode::Char('H') | KeyCode::Left => {
            return KeyOutcome::Audio(AudioCmd::SeekBy(-audio.seek_step_seconds));
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            return KeyOutcome::Audio(AudioCmd::AdjustVolume(audio.volume_step));
        }
        KeyCode::Char('-') => {
            return KeyOutcome::Audio(AudioCmd::AdjustVolume(-audio.volume_step));
        }
        KeyCode::Char('s') => return KeyOutcome::Audio(AudioCmd::ToggleShuffle),
        KeyCode::Char('r') => return KeyOutcome::Audio(AudioCmd::CycleRepeatMode),
        KeyCode::Char('K') => app.toggle_metadata_window(),
        KeyCode::Char('D') => {
            if let Some(track) = app
                .selected_track()
                .filter(|t| t.source == TrackSource::Local)
            {
                return KeyOutcome::Forget(track.id.clone());
            }
        }
        _ => {}
    }

    KeyOutcome::Continue
}
