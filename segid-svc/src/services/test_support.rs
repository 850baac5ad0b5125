//! Scripted collaborators shared by unit and integration tests
//!
//! Integration tests include this file through `#[path]`, so it names the
//! library as `segid_svc` rather than `crate`.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use segid_svc::models::{AssetInfo, Platform};
use segid_svc::services::JobUpdate;
use segid_svc::types::{AssetError, AssetSource, RecognitionError, Recognizer, TrackMatch};

/// Padded clip whose first line names what it contains
pub fn tagged_audio(tag: &str) -> Bytes {
    let mut data = format!("{}\n", tag).into_bytes();
    data.resize(4096, 0);
    Bytes::from(data)
}

/// First line of a clip produced by [`tagged_audio`]
pub fn audio_tag(audio: &[u8]) -> String {
    let end = audio.iter().position(|b| *b == b'\n').unwrap_or(audio.len());
    String::from_utf8_lossy(&audio[..end]).into_owned()
}

/// Start second of a `win:<start>:<end>` tag
pub fn window_start(tag: &str) -> Option<f64> {
    tag.strip_prefix("win:")?.split(':').next()?.parse().ok()
}

pub fn track(title: &str, artist: &str) -> TrackMatch {
    TrackMatch {
        title: title.to_string(),
        artist: artist.to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Asset source
// ============================================================================

/// Asset source with scripted failures and call counters
pub struct ScriptedSource {
    duration: f64,
    fail_info: bool,
    fail_prepare: bool,
    fail_window: Box<dyn Fn(f64) -> bool + Send + Sync>,
    fail_full: bool,
    parts: Option<usize>,
    info_calls: AtomicUsize,
    window_calls: AtomicUsize,
    full_calls: AtomicUsize,
    split_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            fail_info: false,
            fail_prepare: false,
            fail_window: Box::new(|_| false),
            fail_full: false,
            parts: None,
            info_calls: AtomicUsize::new(0),
            window_calls: AtomicUsize::new(0),
            full_calls: AtomicUsize::new(0),
            split_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_info(mut self) -> Self {
        self.fail_info = true;
        self
    }

    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn failing_windows(mut self, fail: impl Fn(f64) -> bool + Send + Sync + 'static) -> Self {
        self.fail_window = Box::new(fail);
        self
    }

    pub fn failing_full(mut self) -> Self {
        self.fail_full = true;
        self
    }

    /// Force the number of parts `split_full` returns
    pub fn with_parts(mut self, parts: usize) -> Self {
        self.parts = Some(parts);
        self
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn window_calls(&self) -> usize {
        self.window_calls.load(Ordering::SeqCst)
    }

    pub fn full_calls(&self) -> usize {
        self.full_calls.load(Ordering::SeqCst)
    }

    pub fn split_calls(&self) -> usize {
        self.split_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    async fn get_info(&self, url: &str) -> Result<AssetInfo, AssetError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_info {
            return Err(AssetError::CommandFailed {
                command: "info".to_string(),
                status: "1".to_string(),
                stderr: "ERROR: Private video".to_string(),
            });
        }
        Ok(AssetInfo {
            duration: self.duration,
            title: "Scripted mix".to_string(),
            uploader: Some("tester".to_string()),
            upload_date: None,
            thumbnail: None,
            canonical_url: url.to_string(),
            platform: Platform::from_url(url),
        })
    }

    async fn prepare(&self, _url: &str) -> Result<(), AssetError> {
        if self.fail_prepare {
            return Err(AssetError::EmptyOutput);
        }
        Ok(())
    }

    async fn fetch_window(&self, _url: &str, start: f64, end: f64) -> Result<Bytes, AssetError> {
        self.window_calls.fetch_add(1, Ordering::SeqCst);
        if (self.fail_window)(start) {
            return Err(AssetError::CommandFailed {
                command: "window".to_string(),
                status: "1".to_string(),
                stderr: "HTTP Error 403".to_string(),
            });
        }
        Ok(tagged_audio(&format!("win:{}:{}", start, end)))
    }

    async fn fetch_full(&self, _url: &str) -> Result<Bytes, AssetError> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_full {
            return Err(AssetError::EmptyOutput);
        }
        Ok(tagged_audio("full"))
    }

    async fn split_full(&self, _audio: Bytes, window_length: f64) -> Result<Vec<Bytes>, AssetError> {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        let count = self
            .parts
            .unwrap_or_else(|| (self.duration / window_length).ceil() as usize);
        Ok((0..count).map(|i| tagged_audio(&format!("part:{}", i))).collect())
    }
}

// ============================================================================
// Recognizer
// ============================================================================

type Answer = Box<dyn Fn(&str) -> Result<Option<TrackMatch>, RecognitionError> + Send + Sync>;

/// Recognizer answering from the clip tag, tracking peak concurrency
pub struct ScriptedRecognizer {
    answer: Answer,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(
        answer: impl Fn(&str) -> Result<Option<TrackMatch>, RecognitionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            answer: Box::new(answer),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Recognizer that never finds anything
    pub fn silent() -> Self {
        Self::new(|_| Ok(None))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn identify(&self, audio: Bytes) -> Result<Option<TrackMatch>, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = (self.answer)(&audio_tag(&audio));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

// ============================================================================
// Job updates
// ============================================================================

/// Split queued updates into (progress, download progress) sequences
pub fn drain_updates(rx: &mut mpsc::UnboundedReceiver<JobUpdate>) -> (Vec<u8>, Vec<u8>) {
    let mut progress = Vec::new();
    let mut download = Vec::new();
    while let Ok(update) = rx.try_recv() {
        match update {
            JobUpdate::Progress(p) => progress.push(p),
            JobUpdate::DownloadProgress(p) => download.push(p),
            _ => {}
        }
    }
    (progress, download)
}
