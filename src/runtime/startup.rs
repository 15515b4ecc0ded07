//! Builds the track list the player opens with: files imported this session,
//! the persisted library and catalog results.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::catalog::{CatalogClient, or_empty};
use crate::cli::PlayArgs;
use crate::config::{LibrarySettings, Settings};
use crate::library::{
    DirectoryDiscovery, DurationProbe, ImportReport, Importer, LibraryError, LibraryStore,
    SessionHandles, Track,
};

/// Tracks for the player plus what to show about where they came from.
#[derive(Debug, Default)]
pub struct StartupTracks {
    pub tracks: Vec<Track>,
    pub label: String,
    pub status: Option<String>,
}

pub fn open_store(settings: &Settings) -> LibraryStore {
    LibraryStore::open(LibraryStore::default_path(&settings.data_dir()))
}

/// The persisted library together with this process's file handles.
pub struct LibrarySession {
    pub store: LibraryStore,
    pub handles: SessionHandles,
}

impl LibrarySession {
    pub fn open(settings: &Settings, handles: SessionHandles) -> Self {
        Self {
            store: open_store(settings),
            handles,
        }
    }

    /// Remove `id` from the library. Its file handle goes with it, so a
    /// queued copy of the track can no longer be played.
    pub fn remove(&mut self, id: &str) -> Result<bool, LibraryError> {
        let removed = self.store.remove(id)?;
        if removed {
            self.handles.revoke(id);
            info!(id, "removed from library");
        }
        Ok(removed)
    }
}

/// Import a mix of files and directories. Directories go through discovery.
pub fn import_paths<P: DurationProbe>(
    importer: &Importer<P>,
    library: &LibrarySettings,
    paths: &[PathBuf],
) -> ImportReport {
    let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) =
        paths.iter().cloned().partition(|p| p.is_dir());

    let mut report = if files.is_empty() {
        ImportReport::default()
    } else {
        importer.import_files(&files)
    };

    for dir in dirs {
        let mut discovery = DirectoryDiscovery::new(&dir, library.clone());
        match importer.import_from(&mut discovery) {
            Ok(found) => {
                report.imported.extend(found.imported);
                report.failed.extend(found.failed);
            }
            Err(e) => warn!(dir = %dir.display(), "directory import failed: {e}"),
        }
    }
    report
}

/// Persist what was imported. Failure leaves the tracks playable for this
/// session only.
pub fn persist(store: &mut LibraryStore, report: &ImportReport) -> Result<(), LibraryError> {
    if report.imported.is_empty() {
        return Ok(());
    }
    store
        .add(report.records())
        .inspect_err(|e| warn!("imported tracks were not saved: {e}"))
}

/// `"imported 3 tracks, 1 failed (notes.txt: unsupported media type)"`.
pub fn import_summary(report: &ImportReport) -> String {
    let mut text = format!(
        "imported {} track{}",
        report.imported.len(),
        if report.imported.len() == 1 { "" } else { "s" }
    );
    if !report.failed.is_empty() {
        let reasons: Vec<String> = report
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.filename, f.reason))
            .collect();
        text.push_str(&format!(
            ", {} failed ({})",
            report.failed.len(),
            reasons.join("; ")
        ));
    }
    text
}

/// Catalog tracks requested on the command line, with a label per source.
pub fn catalog_tracks(
    client: &dyn CatalogClient,
    args: &PlayArgs,
    limit: usize,
) -> (Vec<Track>, Vec<String>) {
    let mut tracks = Vec::new();
    let mut labels = Vec::new();

    if let Some(query) = args.search.as_deref() {
        tracks.extend(or_empty(client.search_tracks(query, limit), "search results"));
        labels.push(format!("search: {query}"));
    }
    if let Some(genre) = args.genre.as_deref() {
        tracks.extend(or_empty(client.tracks_by_genre(genre, limit), "genre tracks"));
        labels.push(format!("genre: {genre}"));
    }
    if args.catalog {
        tracks.extend(or_empty(client.popular_tracks(limit), "popular tracks"));
        labels.push("popular".to_string());
    }
    (tracks, labels)
}

/// Local tracks first (this session's imports carry live handles), then
/// catalog results.
pub fn assemble(
    store: &LibraryStore,
    handles: &SessionHandles,
    report: &ImportReport,
    args: &PlayArgs,
    catalog: Option<&dyn CatalogClient>,
    limit: usize,
) -> StartupTracks {
    let mut tracks: Vec<Track> = if args.no_library {
        report.tracks().cloned().collect()
    } else {
        store.tracks_for_session(handles)
    };
    // Imports that could not be persisted are missing from the store.
    for track in report.tracks() {
        if !tracks.iter().any(|t| t.id == track.id) {
            tracks.push(track.clone());
        }
    }

    let mut labels = Vec::new();
    if !tracks.is_empty() {
        labels.push(if args.no_library { "imported" } else { "library" }.to_string());
    }
    if let Some(client) = catalog {
        let (remote, remote_labels) = catalog_tracks(client, args, limit);
        tracks.extend(remote);
        labels.extend(remote_labels);
    }

    let status = (!report.imported.is_empty() || !report.failed.is_empty())
        .then(|| import_summary(report));
    info!(tracks = tracks.len(), "startup track list ready");

    StartupTracks {
        tracks,
        label: labels.join(" + "),
        status,
    }
}
