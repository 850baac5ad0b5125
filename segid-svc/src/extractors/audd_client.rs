//! AudD recognition client
//!
//! Submits one clip per request as a multipart upload and maps the response
//! onto [`TrackMatch`]. `"result": null` means "no match" and is not an error.
//!
//! # API Reference
//! - Endpoint: https://api.audd.io/ (multipart: `api_token`, `file`, `return`)
//! - Error codes 900-904 concern the token (missing, invalid, quota)

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::types::{RecognitionError, Recognizer, TrackMatch};

/// Extra metadata providers requested from AudD
const RETURN_PROVIDERS: &str = "apple_music,spotify";

/// User-Agent sent with every request
const USER_AGENT: &str = concat!("segid/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    result: Option<AuddResult>,
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    error_code: i64,
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct AuddResult {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    release_date: Option<String>,
    song_link: Option<String>,
    apple_music: Option<AppleMusic>,
    spotify: Option<Spotify>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleMusic {
    #[serde(default)]
    genre_names: Vec<String>,
    duration_in_millis: Option<u64>,
    isrc: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Spotify {
    id: Option<String>,
    duration_ms: Option<u64>,
    external_ids: Option<SpotifyExternalIds>,
}

#[derive(Debug, Deserialize)]
struct SpotifyExternalIds {
    isrc: Option<String>,
}

/// Recognizer backed by an AudD-compatible endpoint
pub struct AuddRecognizer {
    http_client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl AuddRecognizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RecognitionError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RecognitionError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_token,
        })
    }
}

#[async_trait]
impl Recognizer for AuddRecognizer {
    async fn identify(&self, audio: Bytes) -> Result<Option<TrackMatch>, RecognitionError> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| RecognitionError::Auth("No API token configured".to_string()))?;

        let size = audio.len();
        let file = multipart::Part::stream_with_length(audio, size as u64)
            .file_name("clip.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| RecognitionError::Malformed(e.to_string()))?;
        let form = multipart::Form::new()
            .text("api_token", token.to_string())
            .text("return", RETURN_PROVIDERS)
            .part("file", file);

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionError::Network(format!("AudD request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Api {
                code: status.as_u16() as i64,
                message: body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RecognitionError::Network(e.to_string()))?;
        let track = parse_response(&body)?;

        debug!(
            bytes = size,
            matched = track.is_some(),
            "AudD response received"
        );
        Ok(track)
    }
}

fn parse_response(body: &[u8]) -> Result<Option<TrackMatch>, RecognitionError> {
    let response: AuddResponse =
        serde_json::from_slice(body).map_err(|e| RecognitionError::Malformed(e.to_string()))?;

    if response.status != "success" {
        let Some(error) = response.error else {
            return Err(RecognitionError::Malformed(format!(
                "status {} without error body",
                response.status
            )));
        };
        return Err(match error.error_code {
            900..=904 => RecognitionError::Auth(error.error_message),
            code => RecognitionError::Api {
                code,
                message: error.error_message,
            },
        });
    }

    let Some(result) = response.result else {
        return Ok(None);
    };
    let (Some(title), Some(artist)) = (result.title, result.artist) else {
        return Err(RecognitionError::Malformed(
            "match without title or artist".to_string(),
        ));
    };

    let mut external_ids = BTreeMap::new();
    let mut genre = None;
    let mut duration_ms = None;

    if let Some(link) = result.song_link {
        external_ids.insert("songLink".to_string(), link);
    }
    if let Some(apple) = result.apple_music {
        genre = apple.genre_names.into_iter().find(|g| g != "Music");
        duration_ms = apple.duration_in_millis;
        if let Some(isrc) = apple.isrc {
            external_ids.insert("isrc".to_string(), isrc);
        }
        if let Some(url) = apple.url {
            external_ids.insert("appleMusic".to_string(), url);
        }
    }
    if let Some(spotify) = result.spotify {
        duration_ms = duration_ms.or(spotify.duration_ms);
        if let Some(id) = spotify.id {
            external_ids.insert("spotify".to_string(), id);
        }
        if let Some(isrc) = spotify.external_ids.and_then(|ids| ids.isrc) {
            external_ids.entry("isrc".to_string()).or_insert(isrc);
        }
    }

    Ok(Some(TrackMatch {
        title,
        artist,
        album: result.album,
        genre,
        release_date: result.release_date,
        duration_seconds: duration_ms.map(|ms| (ms / 1000) as u32),
        score: None,
        external_ids,
    }))
}
