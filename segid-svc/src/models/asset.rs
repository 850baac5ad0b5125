//! Resolved asset metadata

use serde::{Deserialize, Serialize};

/// Hosting platform of a source URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Tiktok,
    Instagram,
    Twitter,
    Facebook,
    Soundcloud,
    Vimeo,
    Other,
}

impl Platform {
    /// Classify a URL by its host
    pub fn from_url(source_url: &str) -> Self {
        let host = url::Url::parse(source_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let host = host.strip_prefix("m.").unwrap_or(host);

        match host {
            "youtube.com" | "youtu.be" | "music.youtube.com" => Platform::Youtube,
            "tiktok.com" | "vm.tiktok.com" => Platform::Tiktok,
            "instagram.com" => Platform::Instagram,
            "twitter.com" | "x.com" => Platform::Twitter,
            "facebook.com" | "fb.watch" => Platform::Facebook,
            "soundcloud.com" => Platform::Soundcloud,
            "vimeo.com" | "player.vimeo.com" => Platform::Vimeo,
            _ => Platform::Other,
        }
    }

    /// Classify by the extractor name reported by the asset source
    pub fn from_extractor(extractor: &str) -> Option<Self> {
        let key = extractor.to_ascii_lowercase();
        let platform = if key.starts_with("youtube") {
            Platform::Youtube
        } else if key.starts_with("tiktok") {
            Platform::Tiktok
        } else if key.starts_with("instagram") {
            Platform::Instagram
        } else if key.starts_with("twitter") {
            Platform::Twitter
        } else if key.starts_with("facebook") {
            Platform::Facebook
        } else if key.starts_with("soundcloud") {
            Platform::Soundcloud
        } else if key.starts_with("vimeo") {
            Platform::Vimeo
        } else {
            return None;
        };
        Some(platform)
    }
}

/// Metadata of a remote media asset; immutable once resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    /// Duration in seconds
    pub duration: f64,
    pub title: String,
    pub uploader: Option<String>,
    /// Upload date as reported by the source (usually `YYYYMMDD`)
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    pub canonical_url: String,
    pub platform: Platform,
}
