//! Errors raised while loading shared configuration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reading, parsing or validating a segid config file
#[derive(Error, Debug)]
pub enum Error {
    /// Config file exists but could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A setting holds a value the service cannot run with
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
