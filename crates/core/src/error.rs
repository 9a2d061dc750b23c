//! Error types for gsc-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for gsc-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gsc-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed storage URL (empty string, unknown scheme, missing bucket)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed wildcard pattern
    #[error("Invalid wildcard: {0}")]
    InvalidWildcard(String),

    /// A pattern matched nothing
    #[error("No URLs matched: {0}")]
    NoMatches(String),

    /// Structurally invalid expansion request
    #[error("Invalid result type: {0}")]
    InvalidResultType(String),

    /// Destination wildcard matched more than one resource
    #[error("Destination ({0}) must match exactly 1 URL")]
    AmbiguousDestination(String),

    /// Multi-source operation with a single-object destination
    #[error(
        "Destination URL must name a directory, bucket, or bucket subdirectory \
         for the multiple source form of this command: {0}"
    )]
    DestinationNotContainer(String),

    /// A source would be overwritten by its own copy
    #[error("Source and destination overlap: {source_url} and {destination}")]
    OverlappingSourceDest {
        source_url: String,
        destination: String,
    },

    /// A file occupies a directory's place on disk, or the reverse
    #[error("Cannot retrieve {source_url}: {reason}")]
    DirFileConflict { source_url: String, reason: String },

    /// No credentials configured for a URL scheme
    #[error("No provider configured for {0}:// URLs")]
    ProviderNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint URL parsing error
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Permission failure reported by the storage service
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Feature not supported by backend
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidUrl(_)
            | Error::InvalidWildcard(_)
            | Error::InvalidResultType(_)
            | Error::AmbiguousDestination(_)
            | Error::DestinationNotContainer(_)
            | Error::OverlappingSourceDest { .. }
            | Error::Config(_) => 2, // UsageError
            Error::Network(_) => 3,       // NetworkError
            Error::AccessDenied(_) => 4,  // AuthError
            Error::NotFound(_) | Error::NoMatches(_) | Error::ProviderNotFound(_) => 5, // NotFound
            Error::DirFileConflict { .. } => 6, // Conflict
            Error::UnsupportedFeature(_) => 7, // UnsupportedFeature
            _ => 1,                            // GeneralError
        }
    }

    /// Whether a caller may retry the failed operation
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}
