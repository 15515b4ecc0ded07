//! Durable registry of locally imported track metadata.
//!
//! The whole record set is written as one JSON array on every mutation and
//! swapped into place with a rename, so readers never observe a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::handles::SessionHandles;
use super::model::{LocalTrackRecord, Track};

/// Namespace key of the persisted library blob.
pub const LIBRARY_KEY: &str = "loopify-local-tracks";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("library serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Totals shown in the library header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibrarySummary {
    pub count: usize,
    pub total_seconds: f64,
    pub total_bytes: u64,
}

#[derive(Debug)]
pub struct LibraryStore {
    path: PathBuf,
    records: Vec<LocalTrackRecord>,
}

impl LibraryStore {
    /// Default file for the library blob inside `data_dir`.
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{LIBRARY_KEY}.json"))
    }

    /// Open the store at `path` and load whatever was persisted there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            records: Vec::new(),
        };
        store.reload();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[LocalTrackRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&LocalTrackRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Re-read the persisted set. Unreadable or corrupt data yields an empty
    /// library and is reported; the file is left as-is.
    pub fn reload(&mut self) -> &[LocalTrackRecord] {
        self.records = match read_records(&self.path) {
            Ok(records) => records,
            Err(e) => {
                warn!("could not load library, starting empty: {e}");
                Vec::new()
            }
        };
        &self.records
    }

    /// All records as tracks. Nothing persisted is playable: each track's
    /// `playable` is absent until the file is imported again.
    pub fn tracks(&self) -> Vec<Track> {
        self.records.iter().map(LocalTrackRecord::to_track).collect()
    }

    /// Like [`tracks`](Self::tracks), but reuses handles the current session
    /// already holds for re-imported files.
    pub fn tracks_for_session(&self, handles: &SessionHandles) -> Vec<Track> {
        self.records
            .iter()
            .map(|r| match handles.reference(&r.id) {
                Some(playable) => r.to_track_with(playable),
                None => r.to_track(),
            })
            .collect()
    }

    /// Add or replace (by id) records, then persist the full set.
    pub fn add(&mut self, records: Vec<LocalTrackRecord>) -> Result<(), LibraryError> {
        let mut next = self.records.clone();
        for record in records {
            match next.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => next.push(record),
            }
        }
        self.commit(next)
    }

    /// Remove the record with `id`. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> Result<bool, LibraryError> {
        if !self.records.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        let next: Vec<LocalTrackRecord> =
            self.records.iter().filter(|r| r.id != id).cloned().collect();
        self.commit(next)?;
        Ok(true)
    }

    pub fn summary(&self) -> LibrarySummary {
        LibrarySummary {
            count: self.records.len(),
            total_seconds: self.records.iter().map(|r| r.duration_seconds).sum(),
            total_bytes: self.records.iter().map(|r| r.size_bytes).sum(),
        }
    }

    /// Persist `next`; only on success does it become the visible set.
    fn commit(&mut self, next: Vec<LocalTrackRecord>) -> Result<(), LibraryError> {
        write_records(&self.path, &next)?;
        info!(count = next.len(), path = %self.path.display(), "library persisted");
        self.records = next;
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> LibraryError + '_ {
    move |source| LibraryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_records(path: &Path) -> Result<Vec<LocalTrackRecord>, LibraryError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path)(e)),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_records(path: &Path, records: &[LocalTrackRecord]) -> Result<(), LibraryError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }

    let json = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(&json).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}
