//! Error types for vellum-core

use thiserror::Error;

/// Result type alias using vellum-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vellum-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store rejected a call
    #[error("Remote API error: {0}")]
    Remote(String),

    /// Token is invalid, expired, or the grant was revoked
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Remote catalog manifest could not be decoded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Local store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the stored token can no longer be used.
    ///
    /// `Auth` errors always qualify. Remote errors qualify when the server's
    /// message matches a known invalid/expired grant pattern, since blob-store
    /// APIs report token problems inside otherwise generic error payloads.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Remote(message) => is_auth_failure_message(message),
            Self::Http(error) => error
                .status()
                .is_some_and(|status| status == reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }
}

/// Match error payload text against known invalid/expired token patterns.
pub fn is_auth_failure_message(message: &str) -> bool {
    const PATTERNS: [&str; 4] = [
        "expired_access_token",
        "invalid_access_token",
        "invalid_grant",
        "invalid_refresh_token",
    ];

    let lowered = message.to_ascii_lowercase();
    PATTERNS.iter().any(|pattern| lowered.contains(pattern))
}
