//! Local file importer: turns user-selected files into playable local tracks.
//!
//! Each batch reports per-file failures without aborting. Files whose duration
//! cannot be probed are excluded from the batch and reported.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lofty::prelude::*;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::discovery::{DiscoveryError, DiscoveredFile, FileDiscovery};
use super::handles::SessionHandles;
use super::model::{DEFAULT_COVER, LOCAL_ALBUM, LocalTrackRecord, Track, TrackSource, UNKNOWN_ARTIST};

/// Why a single file was left out of an import batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportFailure {
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("could not determine duration: {0}")]
    DurationProbeFailed(String),
    #[error("could not read file: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedImport {
    pub filename: String,
    pub reason: ImportFailure,
}

/// A freshly imported track together with the metadata to persist for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTrack {
    pub track: Track,
    pub record: LocalTrackRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<ImportedTrack>,
    pub failed: Vec<FailedImport>,
}

impl ImportReport {
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.imported.iter().map(|i| &i.track)
    }

    pub fn records(&self) -> Vec<LocalTrackRecord> {
        self.imported.iter().map(|i| i.record.clone()).collect()
    }
}

/// Reads a file's playable duration in seconds.
pub trait DurationProbe: Sync {
    fn probe(&self, path: &Path) -> Result<f64, String>;
}

/// Probe backed by `lofty`'s audio properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyProbe;

impl DurationProbe for LoftyProbe {
    fn probe(&self, path: &Path) -> Result<f64, String> {
        let tagged = lofty::read_from_path(path).map_err(|e| e.to_string())?;
        let duration = tagged.properties().duration();
        if duration.is_zero() {
            return Err("file reports no duration".to_string());
        }
        Ok(duration.as_secs_f64())
    }
}

/// True if `path` has one of `extensions` (case-insensitive, dot optional).
pub fn is_audio_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .any(|e| !e.is_empty() && e == ext)
        })
        .unwrap_or(false)
}

/// Split a filename stem following `"<title> - <artist>"`.
pub fn split_title_artist(stem: &str) -> (String, String) {
    let stem = stem.trim();
    match stem.split_once(" - ") {
        Some((title, artist)) => {
            let title = title.trim();
            let artist = artist.trim();
            let title = if title.is_empty() { stem } else { title };
            let artist = if artist.is_empty() {
                UNKNOWN_ARTIST
            } else {
                artist
            };
            (title.to_string(), artist.to_string())
        }
        None => (stem.to_string(), UNKNOWN_ARTIST.to_string()),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Id of the local track stored at `path`: `local-` plus the first 16 hex
/// digits of the SHA-256 of its canonical path. The same file always maps to
/// the same id, so importing it again replaces its library record.
pub fn local_track_id(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("local-{}", &digest[..16])
}

pub struct Importer<P = LoftyProbe> {
    extensions: Vec<String>,
    probe: P,
    handles: SessionHandles,
}

impl Importer<LoftyProbe> {
    pub fn new(extensions: Vec<String>, handles: SessionHandles) -> Self {
        Self::with_probe(extensions, handles, LoftyProbe)
    }
}

impl<P: DurationProbe> Importer<P> {
    pub fn with_probe(extensions: Vec<String>, handles: SessionHandles, probe: P) -> Self {
        Self {
            extensions,
            probe,
            handles,
        }
    }

    /// Import a batch of user-selected files.
    pub fn import_files(&self, files: &[PathBuf]) -> ImportReport {
        let mut report = ImportReport::default();

        // (id, path, size) for files that pass the cheap checks.
        let mut candidates: Vec<(String, &PathBuf, u64)> = Vec::new();
        let mut seen = HashSet::new();
        for path in files {
            if !is_audio_file(path, &self.extensions) {
                report.failed.push(FailedImport {
                    filename: file_label(path),
                    reason: ImportFailure::UnsupportedMediaType,
                });
                continue;
            }
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => {
                    let id = local_track_id(path);
                    if seen.insert(id.clone()) {
                        candidates.push((id, path, meta.len()));
                    } else {
                        debug!(file = %path.display(), "skipping duplicate in batch");
                    }
                }
                Ok(_) => report.failed.push(FailedImport {
                    filename: file_label(path),
                    reason: ImportFailure::Unreadable("not a regular file".to_string()),
                }),
                Err(e) => report.failed.push(FailedImport {
                    filename: file_label(path),
                    reason: ImportFailure::Unreadable(e.to_string()),
                }),
            }
        }

        // Probe on the rayon pool; results keep input order.
        let durations: Vec<Result<f64, String>> = candidates
            .par_iter()
            .map(|(_, path, _)| self.probe.probe(path))
            .collect();

        for ((id, path, size_bytes), duration) in candidates.into_iter().zip(durations) {
            let duration_seconds = match duration {
                Ok(d) if d.is_finite() && d > 0.0 => d,
                Ok(d) => {
                    report.failed.push(FailedImport {
                        filename: file_label(path),
                        reason: ImportFailure::DurationProbeFailed(format!("invalid duration {d}")),
                    });
                    continue;
                }
                Err(msg) => {
                    warn!(file = %path.display(), "duration probe failed: {msg}");
                    report.failed.push(FailedImport {
                        filename: file_label(path),
                        reason: ImportFailure::DurationProbeFailed(msg),
                    });
                    continue;
                }
            };

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (title, artist) = split_title_artist(&stem);

            report.imported.push(self.local_track(
                id,
                title,
                artist,
                LOCAL_ALBUM.to_string(),
                duration_seconds,
                size_bytes,
                None,
                path.clone(),
            ));
        }

        info!(
            imported = report.imported.len(),
            failed = report.failed.len(),
            "import batch finished"
        );
        report
    }

    /// Import everything a discovery provider reports, asking for permission first.
    pub fn import_from(
        &self,
        discovery: &mut dyn FileDiscovery,
    ) -> Result<ImportReport, DiscoveryError> {
        if !discovery.has_permission() {
            discovery.request_permission();
            if !discovery.has_permission() {
                return Err(DiscoveryError::PermissionDenied);
            }
        }
        let files = discovery.scan()?;
        Ok(self.import_discovered(files))
    }

    /// Convert provider output into local tracks; the provider's duration is trusted.
    pub fn import_discovered(&self, files: Vec<DiscoveredFile>) -> ImportReport {
        let mut report = ImportReport::default();
        for file in files {
            if !is_audio_file(&file.path, &self.extensions) {
                report.failed.push(FailedImport {
                    filename: file_label(&file.path),
                    reason: ImportFailure::UnsupportedMediaType,
                });
                continue;
            }
            if file.duration_ms == 0 {
                report.failed.push(FailedImport {
                    filename: file_label(&file.path),
                    reason: ImportFailure::DurationProbeFailed(
                        "provider reported no duration".to_string(),
                    ),
                });
                continue;
            }

            let album = if file.album.trim().is_empty() {
                LOCAL_ALBUM.to_string()
            } else {
                file.album
            };
            let artist = if file.artist.trim().is_empty() {
                UNKNOWN_ARTIST.to_string()
            } else {
                file.artist
            };
            debug!(id = %file.id, path = %file.path.display(), "importing discovered file");
            report.imported.push(self.local_track(
                file.id,
                file.title,
                artist,
                album,
                file.duration_ms as f64 / 1000.0,
                file.size_bytes,
                file.cover_uri,
                file.path,
            ));
        }
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn local_track(
        &self,
        id: String,
        title: String,
        artist: String,
        album: String,
        duration_seconds: f64,
        size_bytes: u64,
        cover: Option<String>,
        path: PathBuf,
    ) -> ImportedTrack {
        let playable = self.handles.register(&id, path);
        let track = Track {
            id,
            title,
            artist,
            album,
            duration_seconds,
            cover: cover.unwrap_or_else(|| DEFAULT_COVER.to_string()),
            playable,
            source: TrackSource::Local,
        };
        let record = LocalTrackRecord {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            duration_seconds,
            size_bytes,
        };
        ImportedTrack { track, record }
    }
}
