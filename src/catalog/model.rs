use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::library::{PlayableRef, Track, TrackSource, DEFAULT_COVER};

/// Envelope of every Jamendo v3 response.
#[derive(Debug, Deserialize)]
pub(super) struct JamendoResponse<T> {
    #[serde(default)]
    pub headers: Option<JamendoHeaders>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct JamendoHeaders {
    pub status: String,
    pub error_message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct JamendoTrack {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "lenient_seconds")]
    pub duration: u64,
    pub artist_name: String,
    pub album_name: String,
    pub album_image: String,
    pub audio: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct JamendoAlbum {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub image: String,
    pub releasedate: String,
    pub tracks: Option<Vec<JamendoTrack>>,
}

/// A catalog album with its tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub cover: String,
    pub year: Option<i32>,
    pub track_count: usize,
    pub tracks: Vec<Track>,
}

impl JamendoTrack {
    pub(super) fn into_track(self) -> Track {
        Track {
            id: self.id,
            title: self.name,
            artist: self.artist_name,
            album: self.album_name,
            duration_seconds: self.duration as f64,
            cover: cover_or_default(self.album_image),
            playable: if self.audio.trim().is_empty() {
                PlayableRef::Absent
            } else {
                PlayableRef::Url(self.audio)
            },
            source: TrackSource::Catalog,
        }
    }
}

impl JamendoAlbum {
    pub(super) fn into_album(self) -> Album {
        let cover = cover_or_default(self.image);
        let tracks: Vec<Track> = self
            .tracks
            .unwrap_or_default()
            .into_iter()
            .map(|t| {
                let mut track = t.into_track();
                // Album listings omit per-track artist and album fields.
                if track.artist.is_empty() {
                    track.artist = self.artist_name.clone();
                }
                if track.album.is_empty() {
                    track.album = self.name.clone();
                }
                if track.cover == DEFAULT_COVER {
                    track.cover = cover.clone();
                }
                track
            })
            .collect();

        Album {
            id: self.id,
            title: self.name,
            artist: self.artist_name,
            cover,
            year: release_year(&self.releasedate),
            track_count: tracks.len(),
            tracks,
        }
    }
}

fn cover_or_default(cover: String) -> String {
    if cover.trim().is_empty() {
        DEFAULT_COVER.to_string()
    } else {
        cover
    }
}

/// Year from a `YYYY-MM-DD` release date.
pub(super) fn release_year(date: &str) -> Option<i32> {
    let year = date.trim().split('-').next()?;
    if year.len() != 4 {
        return None;
    }
    year.parse().ok()
}

/// Jamendo sends ids as strings or numbers depending on the endpoint.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Whole seconds from a number or numeric string; anything else is 0.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    })
}
