//! Production collaborators
//!
//! - [`media_tools`] checks the host for yt-dlp and ffmpeg once at startup
//! - [`command_line_source`] implements `AssetSource` on top of them
//! - [`audd_client`] implements `Recognizer` against an AudD-compatible API

pub mod audd_client;
pub mod command_line_source;
pub mod media_tools;

pub use audd_client::AuddRecognizer;
pub use command_line_source::CommandLineSource;
pub use media_tools::{MediaTools, ToolCommand, ToolError};
