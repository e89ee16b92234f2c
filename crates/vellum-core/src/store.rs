//! Local persistence contract.
//!
//! The engine consumes a key-value document store; it never implements one.
//! Callers provide whatever backend fits their platform (the CLI uses JSON
//! files, tests use an in-memory map). All writes the engine performs happen
//! only after a clean merge or an explicit user resolution.

use crate::auth::TokenState;
use crate::catalog::WorkspaceManifest;
use crate::error::Result;
use crate::models::{DocumentRecord, FileId};

/// Read/write contract for the persistent local store.
pub trait LocalStore: Send + Sync {
    /// Fetch a document record, `None` when the id is unknown.
    fn get_document(&self, file_id: &FileId) -> Result<Option<DocumentRecord>>;

    /// Persist a document record (created on first write to its id).
    fn put_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Remove a document record. Removing an unknown id is not an error.
    fn delete_document(&self, file_id: &FileId) -> Result<()>;

    /// Fetch the workspace manifest, `None` on a fresh device.
    fn get_workspace(&self) -> Result<Option<WorkspaceManifest>>;

    /// Persist the workspace manifest wholesale.
    fn put_workspace(&self, manifest: &WorkspaceManifest) -> Result<()>;

    /// Fetch the stored token, `None` when not connected.
    fn get_token(&self) -> Result<Option<TokenState>>;

    /// Replace the stored token wholesale; `None` clears it.
    fn put_token(&self, token: Option<&TokenState>) -> Result<()>;
}
