//! Session-scoped playable handles.
//!
//! Local files are only playable in the session that imported them. The
//! session keeps `id -> path` in memory; nothing here is ever serialized.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// How a track's audio can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableRef {
    /// No handle: metadata present, file missing.
    Absent,
    /// A network URI (catalog streams).
    Url(String),
    /// A file handle registered in a [`SessionHandles`] arena.
    Session { session: u64, id: String },
}

impl PlayableRef {
    pub fn is_absent(&self) -> bool {
        matches!(self, PlayableRef::Absent)
    }
}

/// What a sink is asked to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("file is missing for this session; re-import it")]
    Absent,
    #[error("file handle belongs to an earlier session; re-import it")]
    StaleSession,
    #[error("file handle was released")]
    Revoked,
}

/// In-memory arena of file handles for the running session.
#[derive(Debug, Clone)]
pub struct SessionHandles {
    session: u64,
    paths: Arc<RwLock<HashMap<String, PathBuf>>>,
}

impl Default for SessionHandles {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandles {
    pub fn new() -> Self {
        Self {
            session: rand::random(),
            paths: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `path` under `id` and hand back the reference to put in the track.
    pub fn register(&self, id: &str, path: PathBuf) -> PlayableRef {
        if let Ok(mut paths) = self.paths.write() {
            paths.insert(id.to_string(), path);
        }
        PlayableRef::Session {
            session: self.session,
            id: id.to_string(),
        }
    }

    /// Drop the handle for `id`; later resolves fail.
    pub fn revoke(&self, id: &str) -> bool {
        self.paths
            .write()
            .map(|mut paths| paths.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.paths
            .read()
            .map(|paths| paths.contains_key(id))
            .unwrap_or(false)
    }

    /// The reference for an id this session still holds a file for.
    pub fn reference(&self, id: &str) -> Option<PlayableRef> {
        self.contains(id).then(|| PlayableRef::Session {
            session: self.session,
            id: id.to_string(),
        })
    }

    pub fn resolve(&self, playable: &PlayableRef) -> Result<ResolvedSource, ResolveError> {
        match playable {
            PlayableRef::Absent => Err(ResolveError::Absent),
            PlayableRef::Url(url) => Ok(ResolvedSource::Url(url.clone())),
            PlayableRef::Session { session, id } => {
                if *session != self.session {
                    return Err(ResolveError::StaleSession);
                }
                self.paths
                    .read()
                    .ok()
                    .and_then(|paths| paths.get(id).cloned())
                    .map(ResolvedSource::File)
                    .ok_or(ResolveError::Revoked)
            }
        }
    }
}
