//! External media tool discovery
//!
//! Resolved once at startup. The downloader is `yt-dlp` on PATH, or the
//! Python module (`python3 -m yt_dlp`) when only that is installed; `ffmpeg`
//! must be on PATH. The resulting command handles are injected into
//! [`super::CommandLineSource`].

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// How long a `--version` check may take
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Required tool not found: {0}")]
    Missing(String),
}

/// Program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    prefix_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn with_prefix(program: impl Into<String>, prefix_args: &[&str]) -> Self {
        Self {
            program: program.into(),
            prefix_args: prefix_args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Fresh command with piped output, killed if its future is dropped
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Human-readable form for logs and errors
    pub fn display(&self) -> String {
        if self.prefix_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.prefix_args.join(" "))
        }
    }

    async fn responds_to(&self, version_arg: &str) -> bool {
        let mut cmd = self.command();
        cmd.arg(version_arg);
        let available = match tokio::time::timeout(VERSION_CHECK_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        };
        debug!(command = %self.display(), available, "Tool version check");
        available
    }
}

/// Resolved downloader and transcoder
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub downloader: ToolCommand,
    pub ffmpeg: ToolCommand,
}

impl MediaTools {
    /// Find usable tools on the host
    pub async fn resolve() -> Result<Self, ToolError> {
        let candidates = [
            ToolCommand::new("yt-dlp"),
            ToolCommand::with_prefix("python3", &["-m", "yt_dlp"]),
        ];

        let mut downloader = None;
        for candidate in candidates {
            if candidate.responds_to("--version").await {
                downloader = Some(candidate);
                break;
            }
        }
        let downloader = downloader.ok_or_else(|| ToolError::Missing("yt-dlp".to_string()))?;

        let ffmpeg = ToolCommand::new("ffmpeg");
        if !ffmpeg.responds_to("-version").await {
            return Err(ToolError::Missing("ffmpeg".to_string()));
        }

        info!(
            downloader = %downloader.display(),
            ffmpeg = %ffmpeg.display(),
            "Media tools resolved"
        );
        Ok(Self { downloader, ffmpeg })
    }
}
