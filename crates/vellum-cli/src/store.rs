//! JSON-file implementation of the engine's local store contract.
//!
//! Documents and the workspace manifest live as JSON files under the data
//! directory; the Dropbox token goes to the OS keychain. The in-progress
//! authorization and an outstanding conflict are also parked here so they
//! survive between CLI invocations.

#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use serde::de::DeserializeOwned;
use serde::Serialize;

use vellum_core::auth::{PendingAuthorization, TokenState};
use vellum_core::catalog::WorkspaceManifest;
use vellum_core::error::{Error, Result};
use vellum_core::models::{ConflictState, DocumentRecord, FileId};
use vellum_core::store::LocalStore;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "vellum-cli";
const TOKEN_ENTRY_NAME: &str = "dropbox_token";

/// File-backed [`LocalStore`] rooted at one data directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("documents")).map_err(storage_error)?;
        Ok(Self { root })
    }

    pub fn load_pending_authorization(&self) -> Result<Option<PendingAuthorization>> {
        read_json(&self.pending_path())
    }

    pub fn save_pending_authorization(&self, pending: &PendingAuthorization) -> Result<()> {
        write_json(&self.pending_path(), pending)
    }

    pub fn clear_pending_authorization(&self) -> Result<()> {
        remove_if_present(&self.pending_path())
    }

    pub fn load_conflict(&self) -> Result<Option<ConflictState>> {
        read_json(&self.conflict_path())
    }

    pub fn save_conflict(&self, conflict: &ConflictState) -> Result<()> {
        write_json(&self.conflict_path(), conflict)
    }

    pub fn clear_conflict(&self) -> Result<()> {
        remove_if_present(&self.conflict_path())
    }

    fn document_path(&self, file_id: &FileId) -> PathBuf {
        self.root
            .join("documents")
            .join(format!("{}.json", sanitize_component(file_id.as_str())))
    }

    fn workspace_path(&self) -> PathBuf {
        self.root.join("workspace.json")
    }

    fn pending_path(&self) -> PathBuf {
        self.root.join("pending_auth.json")
    }

    fn conflict_path(&self) -> PathBuf {
        self.root.join("conflict.json")
    }
}

impl LocalStore for JsonFileStore {
    fn get_document(&self, file_id: &FileId) -> Result<Option<DocumentRecord>> {
        read_json(&self.document_path(file_id))
    }

    fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        write_json(&self.document_path(&record.file_id), record)
    }

    fn delete_document(&self, file_id: &FileId) -> Result<()> {
        remove_if_present(&self.document_path(file_id))
    }

    fn get_workspace(&self) -> Result<Option<WorkspaceManifest>> {
        read_json(&self.workspace_path())
    }

    fn put_workspace(&self, manifest: &WorkspaceManifest) -> Result<()> {
        write_json(&self.workspace_path(), manifest)
    }

    fn get_token(&self) -> Result<Option<TokenState>> {
        load_token_secret()
    }

    fn put_token(&self, token: Option<&TokenState>) -> Result<()> {
        match token {
            Some(token) => save_token_secret(token),
            None => clear_token_secret(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(storage_error(error)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).map_err(storage_error)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(storage_error(error)),
    }
}

fn storage_error(error: io::Error) -> Error {
    Error::Storage(error.to_string())
}

/// File ids from a remote catalog are opaque; keep filenames tame.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Token secret persistence (OS keychain, in-memory map under test)
// ---------------------------------------------------------------------------

#[cfg(test)]
fn test_token_store() -> &'static Mutex<HashMap<String, String>> {
    static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(not(test))]
fn token_entry() -> Result<Entry> {
    Entry::new(KEYRING_SERVICE_NAME, TOKEN_ENTRY_NAME)
        .map_err(|error| Error::Storage(error.to_string()))
}

#[cfg(not(test))]
fn load_token_secret() -> Result<Option<TokenState>> {
    let entry = token_entry()?;
    match entry.get_password() {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(Error::Storage(error.to_string())),
    }
}

#[cfg(test)]
fn load_token_secret() -> Result<Option<TokenState>> {
    let store = test_token_store();
    let guard = store
        .lock()
        .map_err(|error| Error::Storage(error.to_string()))?;
    match guard.get(TOKEN_ENTRY_NAME) {
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        None => Ok(None),
    }
}

#[cfg(not(test))]
fn save_token_secret(token: &TokenState) -> Result<()> {
    let raw = serde_json::to_string(token)?;
    token_entry()?
        .set_password(&raw)
        .map_err(|error| Error::Storage(error.to_string()))
}

#[cfg(test)]
fn save_token_secret(token: &TokenState) -> Result<()> {
    let raw = serde_json::to_string(token)?;
    let store = test_token_store();
    let mut guard = store
        .lock()
        .map_err(|error| Error::Storage(error.to_string()))?;
    guard.insert(TOKEN_ENTRY_NAME.to_string(), raw);
    Ok(())
}

#[cfg(not(test))]
fn clear_token_secret() -> Result<()> {
    let entry = token_entry()?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(error) => Err(Error::Storage(error.to_string())),
    }
}

#[cfg(test)]
fn clear_token_secret() -> Result<()> {
    let store = test_token_store();
    let mut guard = store
        .lock()
        .map_err(|error| Error::Storage(error.to_string()))?;
    guard.remove(TOKEN_ENTRY_NAME);
    Ok(())
}
