//! # segid Common Library
//!
//! Shared code for the segid workspace:
//! - Error type used by configuration and IO helpers
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Event types and the EventBus used for SSE broadcasting
//! - SSE helpers
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod sse;

pub use error::{Error, Result};
