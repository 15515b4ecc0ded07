//! File discovery providers: enumerate audio files already on the device.
//!
//! `DirectoryDiscovery` walks a music directory and reads tags the same way the
//! importer would, so discovered files can be imported without user selection.

use std::fs;
use std::path::{Path, PathBuf};

use lofty::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::import::{is_audio_file, local_track_id, split_title_artist};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("permission to read the music location was not granted")]
    PermissionDenied,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file as reported by a discovery provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub path: PathBuf,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub cover_uri: Option<String>,
}

/// A source of on-device audio files.
///
/// `request_permission` has no result; callers observe the outcome through a
/// following `has_permission` check.
pub trait FileDiscovery {
    fn has_permission(&self) -> bool;
    fn request_permission(&mut self);
    fn scan(&mut self) -> Result<Vec<DiscoveredFile>, DiscoveryError>;
    fn rescan(&mut self) -> Result<(), DiscoveryError>;
}

pub struct DirectoryDiscovery {
    root: PathBuf,
    settings: LibrarySettings,
    cached: Option<Vec<DiscoveredFile>>,
}

impl DirectoryDiscovery {
    pub fn new(root: impl Into<PathBuf>, settings: LibrarySettings) -> Self {
        Self {
            root: root.into(),
            settings,
            cached: None,
        }
    }

    fn walk(&self) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
        fs::read_dir(&self.root).map_err(|source| DiscoveryError::Io {
            path: self.root.clone(),
            source,
        })?;

        let settings = &self.settings;
        let mut walker = WalkDir::new(&self.root).follow_links(settings.follow_links);

        // Non-recursive = only the root directory.
        let depth_cap = if settings.recursive {
            settings.max_depth
        } else {
            Some(1)
        };
        if let Some(d) = depth_cap {
            walker = walker.max_depth(d);
        }

        let mut files = Vec::new();
        for entry in walker
            .into_iter()
            .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !path.is_file() || !is_audio_file(path, &settings.extensions) {
                continue;
            }
            files.push(describe(path));
        }

        files.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        info!(root = %self.root.display(), count = files.len(), "directory scan finished");
        Ok(files)
    }
}

impl FileDiscovery for DirectoryDiscovery {
    fn has_permission(&self) -> bool {
        fs::read_dir(&self.root).is_ok()
    }

    fn request_permission(&mut self) {
        // Nothing can be granted from here; surface why access fails.
        if let Err(e) = fs::read_dir(&self.root) {
            warn!(root = %self.root.display(), "music directory is not readable: {e}");
        }
    }

    fn scan(&mut self) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
        if let Some(files) = &self.cached {
            return Ok(files.clone());
        }
        let files = self.walk()?;
        self.cached = Some(files.clone());
        Ok(files)
    }

    fn rescan(&mut self) -> Result<(), DiscoveryError> {
        self.cached = None;
        self.cached = Some(self.walk()?);
        Ok(())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn describe(path: &Path) -> DiscoveredFile {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let (mut title, mut artist) = split_title_artist(&stem);
    let mut album = String::new();
    let mut duration_ms = 0;

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            duration_ms = tagged.properties().duration().as_millis() as u64;

            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(v) = tag.title().filter(|v| !v.trim().is_empty()) {
                    title = v.trim().to_string();
                }
                if let Some(v) = tag.artist().filter(|v| !v.trim().is_empty()) {
                    artist = v.trim().to_string();
                }
                if let Some(v) = tag.album().filter(|v| !v.trim().is_empty()) {
                    album = v.trim().to_string();
                }
            }
        }
        Err(e) => debug!(path = %path.display(), "no readable tags: {e}"),
    }

    DiscoveredFile {
        id: local_track_id(path),
        title,
        artist,
        album,
        path: path.to_path_buf(),
        duration_ms,
        size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        cover_uri: None,
    }
}
