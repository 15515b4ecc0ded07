use std::fs;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::commands::{album_line, record_line, summary_line, track_line};
use super::event_loop::{EventLoopState, KeyOutcome, control_to_audio, handle_key_event};
use super::startup::{
    LibrarySession, assemble, catalog_tracks, import_paths, import_summary, persist,
};
use crate::app::App;
use crate::audio::{AudioCmd, PlaybackState, RepeatMode, Transport};
use crate::catalog::{Album, CatalogClient, CatalogError};
use crate::cli::PlayArgs;
use crate::config::{AudioSettings, LibrarySettings};
use crate::library::{
    DurationProbe, Importer, LibraryStore, LibrarySummary, LocalTrackRecord, PlayableRef,
    SessionHandles, Track, TrackSource,
};
use crate::mpris::ControlCmd;

struct FixedProbe(f64);

impl DurationProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> Result<f64, String> {
        Ok(self.0)
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"audio").unwrap();
    path
}

fn importer(handles: &SessionHandles) -> Importer<FixedProbe> {
    Importer::with_probe(
        LibrarySettings::default().extensions,
        handles.clone(),
        FixedProbe(95.0),
    )
}

fn remote(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Remote {id}"),
        artist: "Catalog Artist".to_string(),
        album: "Catalog Album".to_string(),
        duration_seconds: 200.0,
        cover: String::new(),
        playable: PlayableRef::Url(format!("https://audio.example/{id}.mp3")),
        source: TrackSource::Catalog,
    }
}

/// Search and popular succeed; genre lookups fail.
struct FakeCatalog;

impl CatalogClient for FakeCatalog {
    fn popular_tracks(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        Ok((0..limit).map(|i| remote(&format!("p{i}"))).collect())
    }

    fn search_tracks(&self, query: &str, _limit: usize) -> Result<Vec<Track>, CatalogError> {
        Ok(vec![remote(&format!("s-{query}"))])
    }

    fn tracks_by_genre(&self, _genre: &str, _limit: usize) -> Result<Vec<Track>, CatalogError> {
        Err(CatalogError::Status(503))
    }

    fn featured_albums(&self, _limit: usize) -> Result<Vec<Album>, CatalogError> {
        Ok(Vec::new())
    }
}

#[test]
fn import_paths_handles_files_and_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let song = touch(dir.path(), "Night Drive - Synth Harbor.mp3");
    let notes = touch(dir.path(), "notes.txt");
    let handles = SessionHandles::new();

    let report = import_paths(
        &importer(&handles),
        &LibrarySettings::default(),
        &[song, notes],
    );

    assert_eq!(report.imported.len(), 1);
    let track = &report.imported[0].track;
    assert_eq!(track.title, "Night Drive");
    assert_eq!(track.artist, "Synth Harbor");
    assert!(handles.resolve(&track.playable).is_ok());

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "notes.txt");
    assert_eq!(
        import_summary(&report),
        "imported 1 track, 1 failed (notes.txt: unsupported media type)"
    );
}

#[test]
fn directories_go_through_discovery() {
    let dir = tempfile::tempdir().unwrap();
    // Not real audio: discovery finds no duration for it.
    touch(dir.path(), "broken.mp3");
    touch(dir.path(), "cover.jpg");
    let handles = SessionHandles::new();

    let report = import_paths(
        &importer(&handles),
        &LibrarySettings::default(),
        &[dir.path().to_path_buf()],
    );
    assert!(report.imported.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "broken.mp3");
}

#[test]
fn assemble_puts_library_first_with_live_handles_for_new_imports() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = LibraryStore::open(dir.path().join("library.json"));
    store
        .add(vec![LocalTrackRecord {
            id: "local-old-0".to_string(),
            title: "Old Song".to_string(),
            artist: "Someone".to_string(),
            duration_seconds: 60.0,
            size_bytes: 10,
        }])
        .unwrap();

    let handles = SessionHandles::new();
    let song = touch(dir.path(), "Fresh.ogg");
    let report = import_paths(&importer(&handles), &LibrarySettings::default(), &[song]);
    persist(&mut store, &report).unwrap();

    let args = PlayArgs {
        catalog: true,
        ..PlayArgs::default()
    };
    let initial = assemble(&store, &handles, &report, &args, Some(&FakeCatalog), 2);

    let ids: Vec<&str> = initial.tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], "local-old-0");
    assert_eq!(ids[2..], ["p0", "p1"]);
    assert!(initial.tracks[0].playable.is_absent());
    assert!(handles.resolve(&initial.tracks[1].playable).is_ok());
    assert_eq!(initial.label, "library + popular");
    assert_eq!(initial.status.as_deref(), Some("imported 1 track"));
}

#[test]
fn assemble_without_library_keeps_only_this_sessions_imports() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = LibraryStore::open(dir.path().join("library.json"));
    store
        .add(vec![LocalTrackRecord {
            id: "local-old-0".to_string(),
            title: "Old Song".to_string(),
            artist: "Someone".to_string(),
            duration_seconds: 60.0,
            size_bytes: 10,
        }])
        .unwrap();

    let handles = SessionHandles::new();
    let song = touch(dir.path(), "Fresh.ogg");
    let report = import_paths(&importer(&handles), &LibrarySettings::default(), &[song]);

    let args = PlayArgs {
        no_library: true,
        ..PlayArgs::default()
    };
    // Not persisted: the import still shows up.
    let initial = assemble(&store, &handles, &report, &args, None, 5);
    assert_eq!(initial.tracks.len(), 1);
    assert_eq!(initial.tracks[0].title, "Fresh");
    assert_eq!(initial.label, "imported");
}

#[test]
fn catalog_failures_leave_other_sources_intact() {
    let args = PlayArgs {
        search: Some("lofi".to_string()),
        genre: Some("jazz".to_string()),
        ..PlayArgs::default()
    };
    let (tracks, labels) = catalog_tracks(&FakeCatalog, &args, 5);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].id, "s-lofi");
    assert_eq!(labels, vec!["search: lofi", "genre: jazz"]);
}

fn app_with(n: usize) -> App {
    App::new((0..n).map(|i| remote(&i.to_string())).collect())
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[test]
fn idle_play_requests_start_the_visible_list() {
    let mut app = app_with(3);
    app.set_selected(1);

    match control_to_audio(&ControlCmd::PlayPause, &app) {
        Some(AudioCmd::PlayQueue { tracks, start }) => {
            assert_eq!(tracks.len(), 3);
            assert_eq!(start, 1);
        }
        other => panic!("unexpected {other:?}"),
    }

    app.playback = PlaybackState {
        transport: Transport::Paused,
        ..PlaybackState::default()
    };
    assert!(matches!(
        control_to_audio(&ControlCmd::PlayPause, &app),
        Some(AudioCmd::TogglePause)
    ));
    assert!(matches!(
        control_to_audio(&ControlCmd::Play, &app),
        Some(AudioCmd::Play)
    ));
    assert!(matches!(
        control_to_audio(&ControlCmd::SetLoop(RepeatMode::All), &app),
        Some(AudioCmd::SetRepeatMode(RepeatMode::All))
    ));
    assert!(control_to_audio(&ControlCmd::Quit, &app).is_none());

    let empty = App::new(Vec::new());
    assert!(control_to_audio(&ControlCmd::Play, &empty).is_none());
}

#[test]
fn keys_map_to_engine_commands() {
    let audio = AudioSettings::default();
    let mut app = app_with(3);
    let mut state = EventLoopState::default();

    assert!(matches!(
        handle_key_event(key(KeyCode::Char('L')), &audio, &mut app, &mut state),
        KeyOutcome::Audio(AudioCmd::SeekBy(s)) if s == audio.seek_step_seconds
    ));
    assert!(matches!(
        handle_key_event(key(KeyCode::Char('-')), &audio, &mut app, &mut state),
        KeyOutcome::Audio(AudioCmd::AdjustVolume(v)) if v == -audio.volume_step
    ));
    assert!(matches!(
        handle_key_event(key(KeyCode::Char('r')), &audio, &mut app, &mut state),
        KeyOutcome::Audio(AudioCmd::CycleRepeatMode)
    ));
    assert!(matches!(
        handle_key_event(key(KeyCode::Char(' ')), &audio, &mut app, &mut state),
        KeyOutcome::Control(ControlCmd::PlayPause)
    ));
    assert!(matches!(
        handle_key_event(key(KeyCode::Char('q')), &audio, &mut app, &mut state),
        KeyOutcome::Quit
    ));
}

#[test]
fn enter_plays_from_selection_unless_it_is_already_playing() {
    let audio = AudioSettings::default();
    let mut app = app_with(3);
    let mut state = EventLoopState::default();
    handle_key_event(key(KeyCode::Char('j')), &audio, &mut app, &mut state);
    assert_eq!(app.selected, 1);
    assert!(!app.follow_playback);

    let outcome = handle_key_event(key(KeyCode::Enter), &audio, &mut app, &mut state);
    assert!(matches!(outcome, KeyOutcome::Audio(AudioCmd::PlayQueue { start: 1, .. })));

    app.playback = PlaybackState {
        current_track: Some(app.tracks[1].clone()),
        transport: Transport::Playing,
        ..PlaybackState::default()
    };
    let outcome = handle_key_event(key(KeyCode::Enter), &audio, &mut app, &mut state);
    assert!(matches!(outcome, KeyOutcome::Continue));
}

#[test]
fn gg_needs_two_presses_and_filter_mode_captures_keys() {
    let audio = AudioSettings::default();
    let mut app = app_with(3);
    let mut state = EventLoopState::default();
    app.set_selected(2);

    handle_key_event(key(KeyCode::Char('g')), &audio, &mut app, &mut state);
    assert_eq!(app.selected, 2);
    handle_key_event(key(KeyCode::Char('g')), &audio, &mut app, &mut state);
    assert_eq!(app.selected, 0);

    handle_key_event(key(KeyCode::Char('/')), &audio, &mut app, &mut state);
    assert!(app.filter_mode);
    // `q` is text while filtering.
    let outcome = handle_key_event(key(KeyCode::Char('q')), &audio, &mut app, &mut state);
    assert!(matches!(outcome, KeyOutcome::Continue));
    assert_eq!(app.filter_query, "q");

    handle_key_event(key(KeyCode::Backspace), &audio, &mut app, &mut state);
    handle_key_event(key(KeyCode::Char('2')), &audio, &mut app, &mut state);
    let outcome = handle_key_event(key(KeyCode::Enter), &audio, &mut app, &mut state);
    match outcome {
        KeyOutcome::Audio(AudioCmd::PlayQueue { tracks, start }) => {
            assert_eq!(tracks.len(), 1);
            assert_eq!(tracks[0].id, "2");
            assert_eq!(start, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!app.filter_mode);
}

#[test]
fn listing_lines_are_readable() {
    let record = LocalTrackRecord {
        id: "local-1-0".to_string(),
        title: "Fresh".to_string(),
        artist: "Unknown Artist".to_string(),
        duration_seconds: 95.0,
        size_bytes: 2048,
    };
    let line = record_line(&record);
    assert!(line.starts_with("local-1-0"));
    assert!(line.ends_with("Unknown Artist - Fresh (1:35, 2 KB)"));

    let summary = LibrarySummary {
        count: 2,
        total_seconds: 3900.0,
        total_bytes: 0,
    };
    assert_eq!(summary_line(&summary), "2 tracks • 1h 5m • 0 Bytes");

    assert!(track_line(&remote("7")).ends_with("Catalog Artist - Remote 7 (3:20)"));

    let album = Album {
        id: "404".to_string(),
        title: "Coastline".to_string(),
        artist: "Synth Harbor".to_string(),
        cover: String::new(),
        year: Some(2019),
        track_count: 2,
        tracks: Vec::new(),
    };
    assert!(album_line(&album).ends_with("Synth Harbor - Coastline (2019) • 2 tracks"));
}

#[test]
fn removing_from_library_revokes_the_session_handle() {
    let dir = tempfile::tempdir().unwrap();
    let handles = SessionHandles::new();
    let mut library = LibrarySession {
        store: LibraryStore::open(dir.path().join("library.json")),
        handles: handles.clone(),
    };
    let report = importer(&handles).import_files(&[touch(dir.path(), "Song - Artist.mp3")]);
    persist(&mut library.store, &report).unwrap();
    let id = report.imported[0].track.id.clone();
    assert!(handles.contains(&id));

    assert!(library.remove(&id).unwrap());
    assert!(!handles.contains(&id));
    assert!(library.store.get(&id).is_none());
    assert!(!library.remove(&id).unwrap());
}

#[test]
fn forget_key_only_applies_to_local_tracks() {
    let audio = AudioSettings::default();
    let mut state = EventLoopState::default();
    let handles = SessionHandles::new();
    let dir = tempfile::tempdir().unwrap();
    let report = importer(&handles).import_files(&[touch(dir.path(), "Mine - Me.mp3")]);
    let local = report.imported[0].track.clone();

    let mut app = App::new(vec![remote("r1"), local.clone()]);
    assert!(matches!(
        handle_key_event(key(KeyCode::Char('D')), &audio, &mut app, &mut state),
        KeyOutcome::Continue
    ));

    app.set_selected(1);
    match handle_key_event(key(KeyCode::Char('D')), &audio, &mut app, &mut state) {
        KeyOutcome::Forget(id) => assert_eq!(id, local.id),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(app.remove_track(&local.id).map(|t| t.id), Some(local.id));
    assert_eq!(app.tracks.len(), 1);
    assert_eq!(app.selected, 0);
}
