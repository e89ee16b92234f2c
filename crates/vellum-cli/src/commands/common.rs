//! Shared helpers for CLI commands.

use std::io;
use std::path::PathBuf;

use vellum_core::auth::OAuthClient;
use vellum_core::catalog::WorkspaceManifest;
use vellum_core::config::{EngineConfig, OAuthConfig};
use vellum_core::models::FileId;
use vellum_core::remote::DropboxRemote;
use vellum_core::sync::SyncOrchestrator;

use crate::error::CliError;
use crate::store::JsonFileStore;

pub const ENV_APP_KEY: &str = "VELLUM_DROPBOX_APP_KEY";
const REDIRECT_URI: &str = "http://localhost:53682/vellum/callback";
const UNCONFIGURED_APP_KEY: &str = "unconfigured";

pub type Engine = SyncOrchestrator<DropboxRemote, JsonFileStore>;

/// The Dropbox app key configured via the environment, if any.
fn configured_app_key() -> Option<String> {
    std::env::var(ENV_APP_KEY)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

pub fn data_dir(overridden: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(dir) = overridden {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("vellum"))
        .ok_or_else(|| {
            CliError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no platform data directory; pass --data-dir",
            ))
        })
}

pub fn open_store(overridden: Option<PathBuf>) -> Result<JsonFileStore, CliError> {
    Ok(JsonFileStore::open(data_dir(overridden)?)?)
}

/// OAuth client for the connect flow; requires a configured app key.
pub fn oauth_client() -> Result<OAuthClient, CliError> {
    let app_key = configured_app_key().ok_or(CliError::MissingAppKey)?;
    Ok(OAuthClient::new(OAuthConfig::dropbox(&app_key, REDIRECT_URI)?)?)
}

/// Build the orchestrator over the file store and the Dropbox remote.
///
/// Commands that never exchange tokens still work without an app key; a
/// token refresh against the placeholder key fails loudly instead of
/// silently doing nothing.
pub fn engine(overridden: Option<PathBuf>) -> Result<(Engine, WorkspaceManifest), CliError> {
    let store = open_store(overridden)?;
    let remote = DropboxRemote::new()?;
    let app_key =
        configured_app_key().unwrap_or_else(|| UNCONFIGURED_APP_KEY.to_string());
    let oauth = OAuthClient::new(OAuthConfig::dropbox(&app_key, REDIRECT_URI)?)?;

    let mut engine = SyncOrchestrator::new(remote, store, oauth, EngineConfig::default());
    let manifest = engine.bootstrap_workspace()?;
    Ok((engine, manifest))
}

/// Resolve a user-supplied document reference: exact id, unique id prefix,
/// or exact (case-insensitive) name.
pub fn resolve_file_id(manifest: &WorkspaceManifest, query: &str) -> Result<FileId, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::DocumentNotFound(query.to_string()));
    }

    if let Some(file) = manifest.files.iter().find(|file| file.id.as_str() == query) {
        return Ok(file.id.clone());
    }

    let matches: Vec<_> = manifest
        .files
        .iter()
        .filter(|file| {
            file.id.as_str().starts_with(query) || file.name.eq_ignore_ascii_case(query)
        })
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::DocumentNotFound(query.to_string())),
        [file] => Ok(file.id.clone()),
        many => {
            let candidates: Vec<String> = many
                .iter()
                .map(|file| format!("{} ({})", file.name, short_id(&file.id)))
                .collect();
            Err(CliError::AmbiguousDocumentId(format!(
                "'{query}' matches multiple documents: {}",
                candidates.join(", ")
            )))
        }
    }
}

/// Short id prefix for display.
pub fn short_id(file_id: &FileId) -> &str {
    let id = file_id.as_str();
    &id[..id.len().min(8)]
}

pub fn format_timestamp(unix_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(unix_ms)
        .map_or_else(|| "-".to_string(), |time| time.format("%Y-%m-%d %H:%M").to_string())
}
