//! Configuration loading and artifact folder resolution
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`SEGID_*`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is never fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "SEGID_CONFIG";
/// Environment variable overriding the HTTP bind address
pub const ENV_BIND_ADDRESS: &str = "SEGID_BIND";
/// Environment variable overriding the artifact directory
pub const ENV_ARTIFACT_DIR: &str = "SEGID_ARTIFACT_DIR";
/// Environment variable carrying the recognition service token
pub const ENV_RECOGNITION_TOKEN: &str = "SEGID_RECOGNITION_TOKEN";
/// Environment variable overriding the log filter
pub const ENV_LOG: &str = "SEGID_LOG";

/// Shortest accepted window length; shorter clips are never submitted for recognition
pub const MIN_WINDOW_LENGTH_SECS: u32 = 5;

/// Top-level service configuration (`config.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Socket address the HTTP API binds to
    pub bind_address: String,
    /// Directory holding fetched audio artifacts; platform default when unset
    pub artifact_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub recognition: RecognitionConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

/// Window planning limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target window length in seconds
    pub window_length_secs: u32,
    /// Desired number of sampled windows
    pub window_count: usize,
    /// Longest asset accepted, in seconds
    pub max_duration_secs: u64,
}

/// Recognition service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Global cap on in-flight recognition calls
    pub concurrency: usize,
    /// Pause between recognition batches
    pub batch_delay_ms: u64,
    /// Per-call timeout
    pub timeout_secs: u64,
    /// Payloads smaller than this are never submitted
    pub min_payload_bytes: usize,
    /// Payloads larger than this are never submitted
    pub max_payload_bytes: usize,
    /// Recognition endpoint (AudD-compatible)
    pub endpoint: String,
    /// API token; usually supplied through `SEGID_RECOGNITION_TOKEN`
    pub api_token: Option<String>,
}

/// Timeouts for asset source calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub window_timeout_secs: u64,
    pub full_timeout_secs: u64,
    pub info_timeout_secs: u64,
}

/// Metadata cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

/// Artifact cleanup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Nominal artifact lifetime; the reaper applies a 1.5x safety margin
    pub artifact_max_age_secs: u64,
    /// Sweep period
    pub interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "segid_svc=debug"
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5730".to_string(),
            artifact_dir: None,
            pipeline: PipelineConfig::default(),
            recognition: RecognitionConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            cleanup: CleanupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_length_secs: 15,
            window_count: 6,
            max_duration_secs: 3 * 60 * 60,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            batch_delay_ms: 50,
            timeout_secs: 20,
            min_payload_bytes: 1024,
            max_payload_bytes: 10 * 1024 * 1024,
            endpoint: "https://api.audd.io/".to_string(),
            api_token: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            window_timeout_secs: 60,
            full_timeout_secs: 600,
            info_timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 * 60 }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            artifact_max_age_secs: 60 * 60,
            interval_secs: 6 * 60 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `SEGID_*` overrides using the supplied lookup
    ///
    /// Taking the lookup as a parameter keeps this testable without touching
    /// process environment.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(ENV_BIND_ADDRESS).filter(|v| !v.trim().is_empty()) {
            self.bind_address = bind;
        }
        if let Some(dir) = lookup(ENV_ARTIFACT_DIR).filter(|v| !v.trim().is_empty()) {
            self.artifact_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = lookup(ENV_RECOGNITION_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.recognition.api_token = Some(token);
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.window_length_secs < MIN_WINDOW_LENGTH_SECS {
            return Err(Error::Config(format!(
                "pipeline.window_length_secs must be at least {}",
                MIN_WINDOW_LENGTH_SECS
            )));
        }
        if self.pipeline.window_count == 0 {
            return Err(Error::Config("pipeline.window_count must be > 0".into()));
        }
        if self.pipeline.max_duration_secs == 0 {
            return Err(Error::Config("pipeline.max_duration_secs must be > 0".into()));
        }
        if self.recognition.concurrency == 0 {
            return Err(Error::Config("recognition.concurrency must be > 0".into()));
        }
        if self.recognition.min_payload_bytes > self.recognition.max_payload_bytes {
            return Err(Error::Config(format!(
                "recognition.min_payload_bytes ({}) exceeds max_payload_bytes ({})",
                self.recognition.min_payload_bytes, self.recognition.max_payload_bytes
            )));
        }
        if self.cleanup.interval_secs == 0 {
            return Err(Error::Config("cleanup.interval_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Artifact directory, or the platform default when not configured
    pub fn resolve_artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(default_artifact_dir)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.interval_secs)
    }

    pub fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup.artifact_max_age_secs)
    }
}

impl FetchConfig {
    pub fn window_timeout(&self) -> Duration {
        Duration::from_secs(self.window_timeout_secs)
    }

    pub fn full_timeout(&self) -> Duration {
        Duration::from_secs(self.full_timeout_secs)
    }

    pub fn info_timeout(&self) -> Duration {
        Duration::from_secs(self.info_timeout_secs)
    }
}

impl RecognitionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Locate the config file
///
/// Priority: explicit path → `SEGID_CONFIG` → `~/.config/segid/config.toml`
/// → `/etc/segid/config.toml` (Linux only). Returns the user path even when
/// it does not exist so callers can report where defaults came from.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("segid").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/segid/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// OS-dependent default artifact folder
fn default_artifact_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("segid").join("artifacts"))
        .unwrap_or_else(|| std::env::temp_dir().join("segid-artifacts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.pipeline.window_length_secs, 15);
        assert_eq!(config.pipeline.window_count, 6);
        assert_eq!(config.recognition.concurrency, 50);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cleanup.interval_secs, 21600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            bind_address = "0.0.0.0:9000"

            [recognition]
            concurrency = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.recognition.concurrency, 8);
        assert_eq!(config.recognition.timeout_secs, 20);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_env_overrides_take_priority() {
        let mut config = TomlConfig::default();
        let env: HashMap<&str, &str> = [
            (ENV_BIND_ADDRESS, "0.0.0.0:1234"),
            (ENV_RECOGNITION_TOKEN, "secret"),
            (ENV_LOG, ""),
        ]
        .into_iter()
        .collect();

        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_address, "0.0.0.0:1234");
        assert_eq!(config.recognition.api_token.as_deref(), Some("secret"));
        // Blank values are ignored
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_inverted_payload_bounds() {
        let mut config = TomlConfig::default();
        config.recognition.min_payload_bytes = 100;
        config.recognition.max_payload_bytes = 10;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_short_windows() {
        let mut config = TomlConfig::default();
        config.pipeline.window_length_secs = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window_count() {
        let mut config = TomlConfig::default();
        config.pipeline.window_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TomlConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bind_address = [").unwrap();
        assert!(matches!(TomlConfig::load(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TomlConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error: "));
    }

    #[test]
    fn test_invalid_setting_names_itself() {
        let mut config = TomlConfig::default();
        config.recognition.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: recognition.concurrency must be > 0"
        );
    }
}
