//! UI rendering for the terminal user interface, built on `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    widgets::{Block, Borders, Clear, List, ListItem, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock};

use crate::app::App;
use crate::audio::{PlaybackState, RepeatMode, Transport};
use crate::config::AudioSettings;
use crate::library::{PlayableRef, TrackSource, format_duration};

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("j/k", "up/down"),
        ("gg/G", "top/bottom"),
        ("enter", "play from here"),
        ("space/p", "play/pause"),
        ("h/l", "prev/next song"),
        ("x", "stop"),
        ("/", "filter"),
        ("s", "shuffle"),
        ("r", "repeat mode"),
        ("K", "metadata"),
        ("D", "remove from library"),
        ("q", "quit"),
    ])
});

/// Controls help text. Seek and volume steps come from the settings.
pub fn controls_text(seek_step_seconds: f64, volume_step: f32) -> String {
    let order = [
        "j/k", "enter", "space/p", "h/l", "H/L", "-/+", "x", "gg/G", "K", "D", "/", "s", "r", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] seek -/+{seek_step_seconds}s")),
            "-/+" => Some(format!(
                "[-/+] volume -/+{}%",
                (volume_step * 100.0).round()
            )),
            _ => CONTROLS_MAP.get(k).map(|v| format!("[{k}] {v}")),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

fn repeat_label(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "REPEAT: Off",
        RepeatMode::All => "REPEAT: All",
        RepeatMode::One => "REPEAT: One",
    }
}

/// `"title [0:42/3:05]"` for the current track.
pub fn now_playing_text(playback: &PlaybackState) -> Option<String> {
    let track = playback.current_track.as_ref()?;
    Some(format!(
        "{} [{}/{}]",
        track.display(),
        format_duration(playback.position_seconds),
        format_duration(playback.duration_seconds())
    ))
}

/// Everything shown in the status box, in order.
pub fn status_parts(app: &App) -> Vec<String> {
    let playback = &app.playback;
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("PLAYER: {}", playback.transport.label()));
    if let Some(song) = now_playing_text(playback) {
        parts.push(format!("Song: {song}"));
    }
    parts.push(format!("VOL: {:.0}%", playback.volume * 100.0));
    parts.push(
        if playback.shuffle {
            "SHUFFLE: On"
        } else {
            "SHUFFLE: Off"
        }
        .to_string(),
    );
    parts.push(repeat_label(playback.repeat_mode).to_string());
    if let Some(cursor) = playback.queue_cursor {
        parts.push(format!("QUEUE: {}/{}", cursor + 1, playback.queue.len()));
    }

    parts.push(
        if app.follow_playback {
            "CURSOR: Follow"
        } else {
            "CURSOR: Free-roam"
        }
        .to_string(),
    );

    let q = app.filter_query.trim();
    if app.filter_mode || !q.is_empty() {
        let mut filter_part = String::from("FILTER:");
        if !q.is_empty() {
            filter_part.push(' ');
            filter_part.push_str(q);
        }
        parts.push(filter_part);
    }

    if playback.transport == Transport::Errored {
        if let Some(err) = &playback.last_error {
            parts.push(format!("ERROR: {err}"));
        }
    }
    if let Some(msg) = &app.status {
        parts.push(msg.clone());
    }
    parts
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Upper-case the matched characters so fuzzy hits stand out.
fn highlight_matches(title: &str, positions: Vec<usize>) -> String {
    let mut rendered = String::new();
    let mut pos_iter = positions.into_iter();
    let mut next_pos = pos_iter.next();

    for (ci, ch) in title.chars().enumerate() {
        if next_pos == Some(ci) {
            rendered.extend(ch.to_uppercase());
            next_pos = pos_iter.next();
        } else {
            rendered.push(ch);
        }
    }
    rendered
}

fn metadata_text(app: &App) -> String {
    let Some(track) = app.selected_track() else {
        return "No track selected".to_string();
    };
    let source = match track.source {
        TrackSource::Catalog => "catalog",
        TrackSource::Local => "local",
    };
    let playable = match &track.playable {
        PlayableRef::Absent => "missing (import again)".to_string(),
        PlayableRef::Url(url) => url.clone(),
        PlayableRef::Session { .. } => "this session".to_string(),
    };
    format!(
        "Title: {}\nArtist: {}\nAlbum: {}\nDuration: {}\nSource: {}\nAudio: {}",
        track.title,
        track.artist,
        track.album,
        format_duration(track.duration_seconds),
        source,
        playable
    )
}

fn padded_block(title: &str) -> Block<'_> {
    Block::bordered()
        .padding(Padding {
            left: 1,
            right: 0,
            top: 0,
            bottom: 0,
        })
        .title(title)
}

/// Render the entire UI into `frame`.
pub fn draw(frame: &mut Frame, app: &App, display: &[usize], audio: &AudioSettings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header_text = if !app.has_tracks() {
        "no tracks: pass audio files or --catalog".to_string()
    } else if app.source_label.is_empty() {
        format!("{} tracks", app.tracks.len())
    } else {
        format!("{} • {} tracks", app.source_label, app.tracks.len())
    };
    let header = Paragraph::new(header_text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" loopify ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status_par = Paragraph::new(status_parts(app).join(" • "))
        .slow_blink()
        .block(padded_block(" status "))
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    // Main list
    {
        let q = app.filter_query.trim();
        let query_lower = (!q.is_empty() && app.uses_lower_titles()).then(|| q.to_ascii_lowercase());
        let now_playing = app.now_playing_index();

        // Only build items for the visible window, centred on the selection.
        let total = display.len();
        let list_height = chunks[2].height.saturating_sub(2) as usize;
        let sel_pos = display.iter().position(|&i| i == app.selected).unwrap_or(0);
        let (start, end, selected_pos_in_visible) = if total <= list_height || list_height == 0 {
            (0, total, sel_pos)
        } else {
            let half = list_height / 2;
            let mut start = sel_pos.saturating_sub(half);
            if start + list_height > total {
                start = total - list_height;
            }
            (start, start + list_height, sel_pos - start)
        };

        let visible_items: Vec<ListItem> = display[start..end]
            .iter()
            .map(|&i| {
                let track = &app.tracks[i];
                let title = track.display();
                let mut text = if q.is_empty() {
                    title
                } else {
                    let positions = match query_lower.as_deref() {
                        Some(ql) => app.fuzzy_match_positions_for_track_lower(i, ql),
                        None => App::fuzzy_match_positions(&title, q),
                    };
                    match positions {
                        Some(positions) => highlight_matches(&title, positions),
                        None => title,
                    }
                };
                text.push_str(&format!("  ({})", format_duration(track.duration_seconds)));

                let item = ListItem::new(text);
                if Some(i) == now_playing {
                    item.add_modifier(Modifier::BOLD)
                } else if track.playable.is_absent() {
                    item.add_modifier(Modifier::DIM)
                } else {
                    item
                }
            })
            .collect();

        let list = List::new(visible_items)
            .block(Block::default().borders(Borders::ALL).title(" tracks "))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ratatui::widgets::ListState::default();
        if total > 0 {
            state.select(Some(selected_pos_in_visible));
        }
        frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    // Overlay metadata popup, kept inside the list area.
    if app.metadata_window {
        let popup_area = centered_rect_sized(72, 10, chunks[2]);
        frame.render_widget(Clear, popup_area);

        let meta_paragraph = Paragraph::new(metadata_text(app))
            .block(padded_block(" metadata (K closes) "))
            .wrap(Wrap { trim: true });
        frame.render_widget(meta_paragraph, popup_area);
    }

    let footer = Paragraph::new(controls_text(audio.seek_step_seconds, audio.volume_step))
        .block(padded_block(" controls "))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackError;
    use crate::library::Track;

    fn track() -> Track {
        Track {
            id: "1".into(),
            title: "Night Drive".into(),
            artist: "Synth Harbor".into(),
            album: "Coastline".into(),
            duration_seconds: 185.0,
            cover: String::new(),
            playable: PlayableRef::Url("https://audio.example/1.mp3".into()),
            source: TrackSource::Catalog,
        }
    }

    #[test]
    fn now_playing_shows_position_and_duration() {
        let playback = PlaybackState {
            current_track: Some(track()),
            position_seconds: 42.7,
            ..PlaybackState::default()
        };
        assert_eq!(
            now_playing_text(&playback).as_deref(),
            Some("Synth Harbor - Night Drive [0:42/3:05]")
        );
        assert_eq!(now_playing_text(&PlaybackState::default()), None);
    }

    #[test]
    fn status_reports_error_only_when_errored() {
        let mut app = App::new(vec![track()]);
        app.playback = PlaybackState {
            current_track: Some(track()),
            transport: Transport::Errored,
            last_error: Some(PlaybackError::NotPlayable {
                track_id: "1".into(),
            }),
            queue: vec![track()],
            queue_cursor: Some(0),
            ..PlaybackState::default()
        };
        let parts = status_parts(&app);
        assert_eq!(parts[0], "PLAYER: error");
        assert!(parts.contains(&"QUEUE: 1/1".to_string()));
        assert!(parts.iter().any(|p| p.starts_with("ERROR: ")));

        app.playback.transport = Transport::Ready;
        assert!(!status_parts(&app).iter().any(|p| p.starts_with("ERROR: ")));
    }

    #[test]
    fn controls_include_configured_steps() {
        let text = controls_text(5.0, 0.05);
        assert!(text.contains("[H/L] seek -/+5s"));
        assert!(text.contains("[h/l] prev/next song"));
        assert!(text.contains("[-/+] volume -/+5%"));
        assert!(text.contains("[q] quit"));
    }

    #[test]
    fn matches_are_upper_cased() {
        assert_eq!(highlight_matches("night drive", vec![0, 6]), "Night Drive");
    }
}
