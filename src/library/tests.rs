use super::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

/// Probe that reports a fixed duration unless the filename contains "broken".
struct FixedProbe(f64);

impl DurationProbe for FixedProbe {
    fn probe(&self, path: &Path) -> Result<f64, String> {
        if path.to_string_lossy().contains("broken") {
            Err("decode failed".to_string())
        } else {
            Ok(self.0)
        }
    }
}

fn exts() -> Vec<String> {
    vec!["mp3".into(), "flac".into(), "wav".into(), "ogg".into()]
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, b"0123456789").unwrap();
    p
}

fn record(id: &str, title: &str) -> LocalTrackRecord {
    LocalTrackRecord {
        id: id.into(),
        title: title.into(),
        artist: "Artist".into(),
        duration_seconds: 180.5,
        size_bytes: 4_096,
    }
}

#[test]
fn filename_convention_splits_title_and_artist() {
    assert_eq!(
        split_title_artist("Starlight - Luna Echo"),
        ("Starlight".to_string(), "Luna Echo".to_string())
    );
    assert_eq!(
        split_title_artist("Ambient"),
        ("Ambient".to_string(), "Unknown Artist".to_string())
    );
    assert_eq!(
        split_title_artist("  Song  -  Band  "),
        ("Song".to_string(), "Band".to_string())
    );
    // Only the first separator splits.
    assert_eq!(
        split_title_artist("A - B - C"),
        ("A".to_string(), "B - C".to_string())
    );
}

#[test]
fn import_derives_title_artist_from_filenames() {
    let dir = tempdir().unwrap();
    let files = vec![
        touch(dir.path(), "Starlight - Luna Echo.mp3"),
        touch(dir.path(), "Ambient.wav"),
    ];

    let importer = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(200.0));
    let report = importer.import_files(&files);

    assert!(report.failed.is_empty());
    let tracks: Vec<&Track> = report.tracks().collect();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].title, "Starlight");
    assert_eq!(tracks[0].artist, "Luna Echo");
    assert_eq!(tracks[1].title, "Ambient");
    assert_eq!(tracks[1].artist, "Unknown Artist");
    assert_eq!(tracks[0].album, LOCAL_ALBUM);
    assert_eq!(tracks[0].source, TrackSource::Local);
    assert_eq!(tracks[0].duration_seconds, 200.0);
    assert_ne!(tracks[0].id, tracks[1].id);
    assert!(tracks[0].id.starts_with("local-"));

    let records = report.records();
    assert_eq!(records[0].size_bytes, 10);
    assert_eq!(records[0].title, "Starlight");
}

#[test]
fn imported_tracks_resolve_in_their_session() {
    let dir = tempdir().unwrap();
    let path = touch(dir.path(), "Song.flac");
    let handles = SessionHandles::new();

    let importer = Importer::with_probe(exts(), handles.clone(), FixedProbe(10.0));
    let report = importer.import_files(&[path.clone()]);
    let track = &report.imported[0].track;

    assert_eq!(handles.resolve(&track.playable), Ok(ResolvedSource::File(path)));
    // Another session cannot use the handle.
    let other = SessionHandles::new();
    assert_eq!(
        other.resolve(&track.playable),
        Err(ResolveError::StaleSession)
    );
}

#[test]
fn import_rejects_non_audio_without_aborting_batch() {
    let dir = tempdir().unwrap();
    let files = vec![
        touch(dir.path(), "notes.txt"),
        touch(dir.path(), "Good.ogg"),
        touch(dir.path(), "cover.jpg"),
    ];

    let importer = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(60.0));
    let report = importer.import_files(&files);

    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].filename, "notes.txt");
    assert_eq!(report.failed[0].reason, ImportFailure::UnsupportedMediaType);
    assert_eq!(report.failed[1].filename, "cover.jpg");
}

#[test]
fn import_excludes_and_reports_duration_probe_failures() {
    let dir = tempdir().unwrap();
    let files = vec![
        touch(dir.path(), "broken - Band.mp3"),
        touch(dir.path(), "fine - Band.mp3"),
    ];
    let handles = SessionHandles::new();

    let importer = Importer::with_probe(exts(), handles.clone(), FixedProbe(60.0));
    let report = importer.import_files(&files);

    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.imported[0].track.title, "fine");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "broken - Band.mp3");
    assert!(matches!(
        report.failed[0].reason,
        ImportFailure::DurationProbeFailed(_)
    ));
}

#[test]
fn import_reports_missing_files_as_unreadable() {
    let dir = tempdir().unwrap();
    let importer = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(60.0));
    let report = importer.import_files(&[dir.path().join("gone.mp3")]);

    assert!(report.imported.is_empty());
    assert!(matches!(report.failed[0].reason, ImportFailure::Unreadable(_)));
}

#[test]
fn lofty_probe_fails_on_garbage_audio() {
    let dir = tempdir().unwrap();
    let path = touch(dir.path(), "fake.mp3");

    let importer = Importer::new(exts(), SessionHandles::new());
    let report = importer.import_files(&[path]);
    assert!(report.imported.is_empty());
    assert!(matches!(
        report.failed[0].reason,
        ImportFailure::DurationProbeFailed(_)
    ));
}

struct FakeDiscovery {
    granted: bool,
    grant_on_request: bool,
    files: Vec<DiscoveredFile>,
}

impl FileDiscovery for FakeDiscovery {
    fn has_permission(&self) -> bool {
        self.granted
    }

    fn request_permission(&mut self) {
        self.granted = self.grant_on_request;
    }

    fn scan(&mut self) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
        Ok(self.files.clone())
    }

    fn rescan(&mut self) -> Result<(), DiscoveryError> {
        Ok(())
    }
}

fn discovered(id: &str, path: &str, duration_ms: u64) -> DiscoveredFile {
    DiscoveredFile {
        id: id.into(),
        title: "Title".into(),
        artist: String::new(),
        album: "Record".into(),
        path: PathBuf::from(path),
        duration_ms,
        size_bytes: 1_000,
        cover_uri: Some("file:///covers/1.jpg".into()),
    }
}

#[test]
fn import_from_discovery_requests_permission_first() {
    let mut denied = FakeDiscovery {
        granted: false,
        grant_on_request: false,
        files: vec![discovered("a", "/music/a.mp3", 1_000)],
    };
    let importer = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(1.0));
    assert!(matches!(
        importer.import_from(&mut denied),
        Err(DiscoveryError::PermissionDenied)
    ));

    let mut granted = FakeDiscovery {
        granted: false,
        grant_on_request: true,
        files: vec![
            discovered("a", "/music/a.mp3", 90_500),
            discovered("b", "/music/b.mp3", 0),
            discovered("c", "/music/c.pdf", 1_000),
        ],
    };
    let report = importer.import_from(&mut granted).unwrap();
    assert_eq!(report.imported.len(), 1);
    let track = &report.imported[0].track;
    assert_eq!(track.id, "a");
    assert_eq!(track.duration_seconds, 90.5);
    assert_eq!(track.artist, UNKNOWN_ARTIST);
    assert_eq!(track.album, "Record");
    assert_eq!(track.cover, "file:///covers/1.jpg");
    assert!(matches!(
        report.failed[0].reason,
        ImportFailure::DurationProbeFailed(_)
    ));
    assert_eq!(report.failed[1].reason, ImportFailure::UnsupportedMediaType);
}

#[test]
fn store_round_trip_marks_playable_absent() {
    let dir = tempdir().unwrap();
    let path = LibraryStore::default_path(dir.path());

    let r1 = record("local-1-0", "One");
    let r2 = record("local-1-1", "Two");
    {
        let mut store = LibraryStore::open(&path);
        store.add(vec![r1.clone(), r2.clone()]).unwrap();
    }

    let mut store = LibraryStore::open(&path);
    assert_eq!(store.reload(), &[r1, r2][..]);
    let tracks = store.tracks();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.playable.is_absent()));
    assert!(tracks.iter().all(|t| t.source == TrackSource::Local));
}

#[test]
fn store_remove_persists_remaining_records() {
    let dir = tempdir().unwrap();
    let path = LibraryStore::default_path(dir.path());
    let r1 = record("local-1-0", "One");
    let r2 = record("local-1-1", "Two");

    let mut store = LibraryStore::open(&path);
    store.add(vec![r1.clone(), r2.clone()]).unwrap();
    assert!(store.remove(&r1.id).unwrap());
    assert!(!store.remove("missing").unwrap());

    let reloaded = LibraryStore::open(&path);
    assert_eq!(reloaded.records(), &[r2][..]);
}

#[test]
fn store_add_replaces_records_with_the_same_id() {
    let dir = tempdir().unwrap();
    let mut store = LibraryStore::open(LibraryStore::default_path(dir.path()));
    store.add(vec![record("x", "Old"), record("y", "Other")]).unwrap();
    store.add(vec![record("x", "New")]).unwrap();

    let titles: Vec<&str> = store.records().iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["New", "Other"]);
}

#[test]
fn store_file_is_a_camel_case_json_array_without_handles() {
    let dir = tempdir().unwrap();
    let path = LibraryStore::default_path(dir.path());
    let mut store = LibraryStore::open(&path);
    store.add(vec![record("local-9-0", "Nine")]).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &value.as_array().unwrap()[0];
    assert_eq!(first["durationSeconds"], 180.5);
    assert_eq!(first["sizeBytes"], 4096);
    assert!(first.get("playable").is_none());
    assert!(first.get("url").is_none());
    assert!(!dir.path().join("loopify-local-tracks.json.tmp").exists());
}

#[test]
fn corrupt_store_loads_empty_and_recovers_on_next_write() {
    let dir = tempdir().unwrap();
    let path = LibraryStore::default_path(dir.path());
    fs::write(&path, b"{ not json").unwrap();

    let mut store = LibraryStore::open(&path);
    assert!(store.records().is_empty());
    store.add(vec![record("a", "A")]).unwrap();
    assert_eq!(LibraryStore::open(&path).records().len(), 1);
}

#[test]
fn reimported_records_pick_up_session_handles() {
    let dir = tempdir().unwrap();
    let mut store = LibraryStore::open(LibraryStore::default_path(dir.path()));
    store.add(vec![record("a", "A"), record("b", "B")]).unwrap();

    let handles = SessionHandles::new();
    handles.register("b", dir.path().join("b.mp3"));
    let tracks = store.tracks_for_session(&handles);
    assert!(tracks[0].playable.is_absent());
    assert!(handles.resolve(&tracks[1].playable).is_ok());

    assert!(handles.revoke("b"));
    assert_eq!(
        handles.resolve(&tracks[1].playable),
        Err(ResolveError::Revoked)
    );
}

#[test]
fn summary_and_formatting_helpers() {
    let dir = tempdir().unwrap();
    let mut store = LibraryStore::open(LibraryStore::default_path(dir.path()));
    store
        .add(vec![record("a", "A"), record("b", "B")])
        .unwrap();
    let summary = store.summary();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total_seconds, 361.0);
    assert_eq!(format_total_time(summary.total_seconds), "6m");
    assert_eq!(format_total_time(3_900.0), "1h 5m");
    assert_eq!(format_duration(185.9), "3:05");
    assert_eq!(format_duration(f64::NAN), "0:00");
    assert_eq!(format_file_size(0), "0 Bytes");
    assert_eq!(format_file_size(1_536), "1.5 KB");
}

#[test]
fn reimporting_a_file_in_a_new_session_replaces_its_record() {
    let music = tempdir().unwrap();
    let data = tempdir().unwrap();
    let song = touch(music.path(), "Starlight - Luna Echo.mp3");
    let store_path = LibraryStore::default_path(data.path());

    let first = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(200.0))
        .import_files(&[song.clone()]);
    LibraryStore::open(&store_path).add(first.records()).unwrap();

    // Next session: the record is back but its file is missing until re-imported.
    let handles = SessionHandles::new();
    let mut store = LibraryStore::open(&store_path);
    assert!(store.tracks_for_session(&handles)[0].playable.is_absent());

    let second = Importer::with_probe(exts(), handles.clone(), FixedProbe(200.0))
        .import_files(&[song]);
    assert_eq!(second.imported[0].track.id, first.imported[0].track.id);
    store.add(second.records()).unwrap();

    let tracks = LibraryStore::open(&store_path).tracks_for_session(&handles);
    assert_eq!(tracks.len(), 1);
    assert!(handles.resolve(&tracks[0].playable).is_ok());
}

#[test]
fn the_same_file_twice_in_a_batch_imports_once() {
    let dir = tempdir().unwrap();
    let song = touch(dir.path(), "Song.mp3");
    let dotted = dir.path().join(".").join("Song.mp3");

    let report = Importer::with_probe(exts(), SessionHandles::new(), FixedProbe(30.0))
        .import_files(&[song.clone(), dotted]);

    assert_eq!(report.imported.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.imported[0].track.id, local_track_id(&song));
}

/// Sleeps briefly and records how many probes ran at once.
#[derive(Default)]
struct CountingProbe {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl DurationProbe for CountingProbe {
    fn probe(&self, _path: &Path) -> Result<f64, String> {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(90.0)
    }
}

impl DurationProbe for &CountingProbe {
    fn probe(&self, path: &Path) -> Result<f64, String> {
        (**self).probe(path)
    }
}

#[test]
fn large_batches_probe_with_bounded_parallelism() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = (0..200)
        .map(|i| touch(dir.path(), &format!("Track {i:03}.mp3")))
        .collect();

    let counter = CountingProbe::default();
    let report = Importer::with_probe(exts(), SessionHandles::new(), &counter).import_files(&files);

    assert_eq!(report.imported.len(), 200);
    assert_eq!(report.imported[0].track.title, "Track 000");
    assert_eq!(report.imported[199].track.title, "Track 199");
    let peak = counter.peak.load(Ordering::SeqCst);
    assert!(peak >= 1);
    assert!(
        peak <= rayon::current_num_threads(),
        "{peak} probes ran at once"
    );
}
