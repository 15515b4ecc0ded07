use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CatalogSettings;
use crate::library::Track;

use super::model::{Album, JamendoAlbum, JamendoResponse, JamendoTrack};

/// Tags used for the "popular" listing.
const POPULAR_TAGS: &str = "electronic pop rock indie";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog returned HTTP {0}")]
    Status(u16),
    #[error("catalog response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("catalog rejected the request: {0}")]
    Api(String),
}

/// Read-only source of streamable tracks and albums.
pub trait CatalogClient {
    fn popular_tracks(&self, limit: usize) -> Result<Vec<Track>, CatalogError>;
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;
    fn tracks_by_genre(&self, genre: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;
    fn featured_albums(&self, limit: usize) -> Result<Vec<Album>, CatalogError>;
}

/// Log a failed catalog call and carry on with nothing.
pub fn or_empty<T>(result: Result<Vec<T>, CatalogError>, what: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!("error fetching {what}: {e}");
        Vec::new()
    })
}

/// Jamendo v3 API client.
pub struct JamendoClient {
    http: reqwest::blocking::Client,
    base_url: String,
    client_id: String,
}

impl JamendoClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(concat!("loopify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(http, settings))
    }

    pub(super) fn with_http(http: reqwest::blocking::Client, settings: &CatalogSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client_id: settings.client_id.clone(),
        }
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        limit: usize,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, CatalogError> {
        let url = format!("{}/{}/", self.base_url, endpoint);
        let limit = limit.to_string();
        debug!(%url, ?params, "catalog request");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
            ])
            .query(params)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = response.text()?;
        parse_results(&body)
    }
}

impl CatalogClient for JamendoClient {
    fn popular_tracks(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let tracks: Vec<JamendoTrack> = self.get(
            "tracks",
            limit,
            &[
                ("order", "popularity_total"),
                ("include", "licenses"),
                ("groupby", "artist_id"),
                ("fuzzytags", POPULAR_TAGS),
            ],
        )?;
        Ok(tracks.into_iter().map(JamendoTrack::into_track).collect())
    }

    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let tracks: Vec<JamendoTrack> = self.get(
            "tracks",
            limit,
            &[
                ("search", query),
                ("include", "licenses"),
                ("groupby", "artist_id"),
            ],
        )?;
        Ok(tracks.into_iter().map(JamendoTrack::into_track).collect())
    }

    fn tracks_by_genre(&self, genre: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let tracks: Vec<JamendoTrack> = self.get(
            "tracks",
            limit,
            &[
                ("fuzzytags", genre),
                ("include", "licenses"),
                ("groupby", "artist_id"),
                ("order", "popularity_total"),
            ],
        )?;
        Ok(tracks.into_iter().map(JamendoTrack::into_track).collect())
    }

    fn featured_albums(&self, limit: usize) -> Result<Vec<Album>, CatalogError> {
        let albums: Vec<JamendoAlbum> = self.get(
            "albums",
            limit,
            &[("order", "popularity_total"), ("include", "tracks licenses")],
        )?;
        Ok(albums.into_iter().map(JamendoAlbum::into_album).collect())
    }
}

/// Decode a response body, surfacing API-level failures.
pub(super) fn parse_results<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, CatalogError> {
    let response: JamendoResponse<T> = serde_json::from_str(body)?;
    if let Some(headers) = response.headers {
        if headers.status == "failed" {
            return Err(CatalogError::Api(headers.error_message));
        }
    }
    Ok(response.results)
}
