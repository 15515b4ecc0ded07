//! Track values shared by the catalog, the importer and the playback engine.

use serde::{Deserialize, Serialize};

use super::handles::PlayableRef;

/// Album label given to locally imported tracks.
pub const LOCAL_ALBUM: &str = "Local Music";

/// Cover shown for tracks that do not carry artwork of their own.
pub const DEFAULT_COVER: &str =
    "https://images.unsplash.com/photo-1493225457124-a3eb161ffa5f?w=400&h=400&fit=crop";

/// Artist used when a filename carries no `"<title> - <artist>"` separator.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Where a track came from. Decides how its `playable` reference is resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackSource {
    Catalog,
    Local,
}

/// An immutable track value.
///
/// `duration_seconds` is the authoritative display duration; whatever the
/// audio sink reports is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: f64,
    pub cover: String,
    pub playable: PlayableRef,
    pub source: TrackSource,
}

impl Track {
    /// `"Artist - Title"`, as shown in lists.
    pub fn display(&self) -> String {
        let artist = self.artist.trim();
        if artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", artist, self.title)
        }
    }
}

/// Persisted metadata of a locally imported track.
///
/// Deliberately has no playable reference: handles only live for the session
/// that created them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_seconds: f64,
    pub size_bytes: u64,
}

impl LocalTrackRecord {
    /// Rehydrate as a track whose file is missing until re-imported.
    pub fn to_track(&self) -> Track {
        self.to_track_with(PlayableRef::Absent)
    }

    /// Rehydrate with an explicit playable reference (e.g. a fresh session handle).
    pub fn to_track_with(&self, playable: PlayableRef) -> Track {
        Track {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: LOCAL_ALBUM.to_string(),
            duration_seconds: self.duration_seconds,
            cover: DEFAULT_COVER.to_string(),
            playable,
            source: TrackSource::Local,
        }
    }
}

/// Format seconds as `M:SS`.
pub fn format_duration(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Format a byte count with binary units, e.g. `3.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Format a total play time as `"1h 5m"` or `"12m"`.
pub fn format_total_time(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}
