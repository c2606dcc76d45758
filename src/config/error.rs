use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value was not a number.
    #[error("invalid port '{value}': {source}")]
    PortParseError {
        /// Raw value.
        value: String,
        /// Parse failure.
        source: std::num::ParseIntError,
    },

    /// Port value was out of range.
    #[error("invalid port: '{value}'")]
    InvalidPort {
        /// Raw value.
        value: String,
    },

    /// Bind address did not parse.
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddr {
        /// Raw value.
        value: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// A numeric option did not parse.
    #[error("invalid value for {var}: '{value}'")]
    InvalidNumber {
        /// Environment variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A similarity threshold fell outside `[0, 1]`.
    #[error("threshold {var} must be within [0, 1], got {value}")]
    InvalidThreshold {
        /// Environment variable name.
        var: &'static str,
        /// Parsed value.
        value: f32,
    },

    /// The pgvector backend was selected without a connection URL.
    #[error("USE_PGVECTOR is set but PGVECTOR_DATABASE_URL is not")]
    MissingDatabaseUrl,

    /// The storage path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
}
