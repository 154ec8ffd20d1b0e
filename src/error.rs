//! Error types for VibeSpec

use thiserror::Error;

/// Result type alias for VibeSpec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in VibeSpec
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech recognition was canceled or failed
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis or playback failed
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Completion service unreachable or temporarily failing
    #[error("connection error: {0}")]
    Connection(String),

    /// Completion service rejected the request or sent a malformed stream
    #[error("completion error: {0}")]
    Completion(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("toml error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Whether this error is worth another completion attempt
    ///
    /// Transport-level HTTP failures count as connection errors alongside
    /// explicit [`Error::Connection`] values.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
