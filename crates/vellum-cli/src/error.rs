use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] vellum_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Document name cannot be empty")]
    EmptyName,
    #[error("Document not found for id/prefix/name: {0}")]
    DocumentNotFound(String),
    #[error("{0}")]
    AmbiguousDocumentId(String),
    #[error("No document is open. Use `vellum open <id>` first.")]
    NoActiveDocument,
    #[error("No conflict is outstanding.")]
    NoConflict,
    #[error("No authorization is in progress. Run `vellum connect` first.")]
    NoPendingAuthorization,
    #[error("Not connected. Run `vellum connect` first.")]
    NotConnected,
    #[error("Dropbox app key is not configured. Set VELLUM_DROPBOX_APP_KEY.")]
    MissingAppKey,
    #[error("Invalid hunk override '{0}', expected ID=CHOICE")]
    InvalidHunkOverride(String),
    #[error("{0}")]
    Sync(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}
