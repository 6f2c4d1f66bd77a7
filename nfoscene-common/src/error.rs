//! Configuration errors for the nfoscene crates

use thiserror::Error;

/// Common result type for nfoscene operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised while locating or loading the configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is malformed
    #[error("Configuration error: {0}")]
    Config(String),
}
