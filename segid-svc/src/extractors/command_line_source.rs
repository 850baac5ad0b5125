//! yt-dlp / ffmpeg asset source
//!
//! - Metadata: `yt-dlp --dump-single-json`
//! - Windows: the direct audio stream URL (`yt-dlp -g`) is resolved once per
//!   job and ffmpeg seeks into it, so only the window is transferred. Signed
//!   stream URLs expire, so resolved URLs are kept for [`STREAM_URL_TTL`] at
//!   most and dropped as soon as a window fetch through them fails
//! - Full download: yt-dlp into a scratch directory, transcoded to MP3
//! - Splitting: ffmpeg's segment muxer on a scratch copy
//!
//! Timeouts are applied by the callers; every child is spawned with
//! `kill_on_drop`, so a timed-out call takes its process with it.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use super::media_tools::{MediaTools, ToolCommand};
use crate::models::{AssetInfo, Platform};
use crate::types::{AssetError, AssetSource};

/// Longest stderr excerpt carried in an error
const STDERR_EXCERPT: usize = 500;

/// How long a resolved stream URL is reused
pub const STREAM_URL_TTL: Duration = Duration::from_secs(30 * 60);

/// Output encoding shared by windows, full downloads and parts
const MP3_ARGS: [&str; 9] = ["-vn", "-ac", "2", "-ar", "44100", "-b:a", "128k", "-f", "mp3"];

#[derive(Debug, Deserialize)]
struct InfoJson {
    duration: Option<f64>,
    title: Option<String>,
    uploader: Option<String>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    extractor_key: Option<String>,
}

#[derive(Debug, Clone)]
struct StreamUrl {
    url: String,
    resolved_at: Instant,
}

/// Asset source backed by external command-line tools
pub struct CommandLineSource {
    downloader: ToolCommand,
    ffmpeg: ToolCommand,
    stream_urls: DashMap<String, StreamUrl>,
    stream_ttl: Duration,
}

impl CommandLineSource {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            downloader: tools.downloader,
            ffmpeg: tools.ffmpeg,
            stream_urls: DashMap::new(),
            stream_ttl: STREAM_URL_TTL,
        }
    }

    /// Cached stream URL for `url`, resolving it when absent or expired
    async fn stream_url(&self, url: &str) -> Result<String, AssetError> {
        let now = Instant::now();
        if let Some(cached) = self.stream_urls.get(url) {
            if now.duration_since(cached.resolved_at) < self.stream_ttl {
                return Ok(cached.url.clone());
            }
        }
        self.resolve_stream_url(url).await
    }

    /// Resolve a fresh stream URL and cache it, pruning expired entries
    async fn resolve_stream_url(&self, url: &str) -> Result<String, AssetError> {
        let mut cmd = self.downloader.command();
        cmd.args(["-f", "bestaudio/best", "-g", "--no-playlist", "--no-warnings", url]);
        let stdout = run(cmd, &self.downloader.display()).await?;
        let stream = first_line(&stdout).ok_or(AssetError::EmptyOutput)?;

        debug!(url = %url, "Stream URL resolved");
        let now = Instant::now();
        self.stream_urls
            .retain(|_, cached| now.duration_since(cached.resolved_at) < self.stream_ttl);
        self.stream_urls.insert(
            url.to_string(),
            StreamUrl {
                url: stream.clone(),
                resolved_at: now,
            },
        );
        Ok(stream)
    }

    /// Forget the stream URL for `url` unless it was already replaced
    fn invalidate_stream_url(&self, url: &str, stream: &str) {
        if self
            .stream_urls
            .remove_if(url, |_, cached| cached.url == stream)
            .is_some()
        {
            warn!(url = %url, "Stream URL dropped after a failed window fetch");
        }
    }

    async fn transcode_file(&self, input: &Path) -> Result<Bytes, AssetError> {
        let mut cmd = self.ffmpeg.command();
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(MP3_ARGS)
            .arg("pipe:1");
        non_empty(run(cmd, &self.ffmpeg.display()).await?)
    }
}

#[async_trait]
impl AssetSource for CommandLineSource {
    async fn get_info(&self, url: &str) -> Result<AssetInfo, AssetError> {
        let mut cmd = self.downloader.command();
        cmd.args(["--dump-single-json", "--no-playlist", "--no-warnings", "--skip-download", url]);
        let stdout = run(cmd, &self.downloader.display()).await?;
        parse_info(&stdout, url)
    }

    async fn prepare(&self, url: &str) -> Result<(), AssetError> {
        self.resolve_stream_url(url).await.map(|_| ())
    }

    async fn fetch_window(&self, url: &str, start: f64, end: f64) -> Result<Bytes, AssetError> {
        let stream = self.stream_url(url).await?;

        let mut cmd = self.ffmpeg.command();
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .arg("-ss")
            .arg(format!("{:.3}", start))
            .arg("-t")
            .arg(format!("{:.3}", end - start))
            .arg("-i")
            .arg(&stream)
            .args(MP3_ARGS)
            .arg("pipe:1");

        let fetched = run(cmd, &self.ffmpeg.display()).await.and_then(non_empty);
        if fetched.is_err() {
            self.invalidate_stream_url(url, &stream);
        }
        fetched
    }

    async fn fetch_full(&self, url: &str) -> Result<Bytes, AssetError> {
        let scratch = tempfile::tempdir()?;
        let template = scratch.path().join("source.%(ext)s");

        let mut cmd = self.downloader.command();
        cmd.args(["-f", "bestaudio/best", "--no-playlist", "--no-warnings", "-o"])
            .arg(&template)
            .arg(url);
        run(cmd, &self.downloader.display()).await?;

        let downloaded = single_file(scratch.path()).await?;
        self.transcode_file(&downloaded).await
    }

    async fn split_full(&self, audio: Bytes, window_length: f64) -> Result<Vec<Bytes>, AssetError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("full.mp3");
        tokio::fs::write(&input, &audio).await?;

        let parts_dir = scratch.path().join("parts");
        tokio::fs::create_dir(&parts_dir).await?;

        let mut cmd = self.ffmpeg.command();
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(&input)
            .args(["-f", "segment", "-segment_time"])
            .arg(format!("{:.3}", window_length))
            .args(["-c", "copy"])
            .arg(parts_dir.join("part_%05d.mp3"));
        run(cmd, &self.ffmpeg.display()).await?;

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&parts_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        // Zero-padded names sort in playback order
        paths.sort();

        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            parts.push(Bytes::from(tokio::fs::read(&path).await?));
        }
        Ok(parts)
    }
}

/// Run to completion, returning stdout or a `CommandFailed` with a stderr excerpt
async fn run(mut cmd: Command, label: &str) -> Result<Vec<u8>, AssetError> {
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(AssetError::CommandFailed {
            command: label.to_string(),
            status: output.status.to_string(),
            stderr: stderr_excerpt(&output.stderr),
        });
    }
    Ok(output.stdout)
}

fn non_empty(stdout: Vec<u8>) -> Result<Bytes, AssetError> {
    if stdout.is_empty() {
        return Err(AssetError::EmptyOutput);
    }
    Ok(Bytes::from(stdout))
}

async fn single_file(dir: &Path) -> Result<PathBuf, AssetError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            return Ok(entry.path());
        }
    }
    Err(AssetError::EmptyOutput)
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth_back(STDERR_EXCERPT - 1) {
        Some((idx, _)) if idx > 0 => text[idx..].to_string(),
        _ => text.to_string(),
    }
}

fn first_line(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn parse_info(stdout: &[u8], url: &str) -> Result<AssetInfo, AssetError> {
    let info: InfoJson =
        serde_json::from_slice(stdout).map_err(|e| AssetError::Parse(e.to_string()))?;

    let platform = info
        .extractor_key
        .as_deref()
        .and_then(Platform::from_extractor)
        .unwrap_or_else(|| Platform::from_url(url));

    Ok(AssetInfo {
        // Live streams and some extractors report no duration; rejected later
        duration: info.duration.unwrap_or(0.0),
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        uploader: info.uploader,
        upload_date: info.upload_date,
        thumbnail: info.thumbnail,
        canonical_url: info.webpage_url.unwrap_or_else(|| url.to_string()),
        platform,
    })
}
