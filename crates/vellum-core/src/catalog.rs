//! Multi-document catalog reconciliation.
//!
//! The catalog is the manifest of all known documents (metadata only),
//! synchronized independently of document bodies between two replicas that
//! can both mutate it: the local workspace and the remote well-known path.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{DocumentRecord, FileId};
use crate::remote::RemoteMetadata;

/// Name given to the bootstrap document on a fresh workspace.
pub const DEFAULT_FILE_NAME: &str = "Untitled";

/// Clock-skew slack for the remote-ahead detector. Tunable, not a contract.
pub const DEFAULT_CLOCK_SKEW_TOLERANCE_MS: i64 = 1_000;

const CATALOG_SCHEMA_VERSION: u32 = 1;
const MAX_FILE_NAME_CHARS: usize = 120;

/// Metadata for one document in the catalog.
///
/// Identity is `id`; `name` is mutable and resolved last-writer-wins using
/// `renamed_at`. Timestamps are Unix ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: FileId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub renamed_at: i64,
}

impl FileMeta {
    /// Create metadata for a newly created document.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: FileId::new(),
            name: sanitize_file_name(name),
            created_at: now,
            updated_at: now,
            renamed_at: now,
        }
    }
}

/// The catalog of all known documents plus the currently open one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceManifest {
    pub files: Vec<FileMeta>,
    pub active_file_id: Option<FileId>,
}

impl WorkspaceManifest {
    /// Look up a file's metadata by id.
    #[must_use]
    pub fn file(&self, file_id: &FileId) -> Option<&FileMeta> {
        self.files.iter().find(|file| file.id == *file_id)
    }

    /// Display name for a file, falling back to the default name.
    #[must_use]
    pub fn file_name(&self, file_id: &FileId) -> String {
        self.file(file_id)
            .map_or_else(|| DEFAULT_FILE_NAME.to_string(), |file| file.name.clone())
    }
}

/// Merge the local and remote catalogs into one consistent list.
///
/// Both lists are normalized first. The union keys on `id`: for an id on
/// both sides the local record is kept, the remote `name` wins when its
/// `renamed_at` is at least the local one, and timestamps resolve to
/// min(created)/max(updated)/max(renamed). Ordering favors local-then-remote
/// first-seen order, then a stable sort by `(created_at, name)`.
///
/// `disposable` names a local bootstrap placeholder (default-named,
/// content-empty, never synced). When the local catalog is exactly that
/// entry and the remote catalog is non-empty without it, the placeholder is
/// dropped so it cannot block discovery of a pre-existing remote catalog on
/// a fresh device.
#[must_use]
pub fn merge_file_catalogs(
    local: &[FileMeta],
    remote: &[FileMeta],
    disposable: Option<&FileId>,
    now: i64,
) -> Vec<FileMeta> {
    let mut local_entries = normalize_entries(local, now);
    let remote_entries = normalize_entries(remote, now);

    if let Some(placeholder) = disposable {
        let placeholder_blocks_discovery = local_entries.len() == 1
            && local_entries[0].id == *placeholder
            && !remote_entries.is_empty()
            && !remote_entries.iter().any(|file| file.id == *placeholder);
        if placeholder_blocks_discovery {
            local_entries.clear();
        }
    }

    let mut merged = local_entries;
    for remote_file in remote_entries {
        if let Some(existing) = merged.iter_mut().find(|file| file.id == remote_file.id) {
            if remote_file.renamed_at >= existing.renamed_at {
                existing.name.clone_from(&remote_file.name);
            }
            existing.created_at = existing.created_at.min(remote_file.created_at);
            existing.updated_at = existing.updated_at.max(remote_file.updated_at);
            existing.renamed_at = existing.renamed_at.max(remote_file.renamed_at);
        } else {
            merged.push(remote_file);
        }
    }

    // stable sort keeps first-seen order within ties
    merged.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
    merged
}

/// Whether the remote copy of a shared file has changes the local replica
/// has not seen. Compares the server modification time against the local
/// sync watermark (with `tolerance_ms` of clock-skew slack) and revision
/// tokens when both sides know one. Detection never forces a sync.
#[must_use]
pub fn remote_is_ahead(
    record: &DocumentRecord,
    metadata: &RemoteMetadata,
    tolerance_ms: i64,
) -> bool {
    let newer_than_watermark = record.last_synced_at.map_or(true, |synced_at| {
        metadata.server_modified_at > synced_at + tolerance_ms
    });

    let revision_moved = record
        .remote_revision
        .as_ref()
        .is_some_and(|revision| *revision != metadata.revision);

    newer_than_watermark || revision_moved
}

/// Parse the remote catalog manifest payload.
///
/// A payload that is not valid JSON, or whose schema version is unknown, is
/// a [`Error::Catalog`] — callers degrade that to an empty file list rather
/// than aborting sync. Individual malformed entries (missing id) are
/// silently dropped; missing names and timestamps are backfilled.
pub fn parse_remote_catalog(payload: &str, now: i64) -> Result<Vec<FileMeta>> {
    let raw: RawCatalog = serde_json::from_str(payload)
        .map_err(|error| Error::Catalog(format!("invalid catalog manifest JSON: {error}")))?;

    if raw.version != CATALOG_SCHEMA_VERSION {
        return Err(Error::Catalog(format!(
            "unsupported catalog version {} (expected {})",
            raw.version, CATALOG_SCHEMA_VERSION
        )));
    }

    let files = raw
        .files
        .into_iter()
        .filter_map(|entry| entry.into_file_meta(now))
        .collect();
    Ok(files)
}

/// Serialize a catalog for upload to the remote well-known path.
pub fn serialize_remote_catalog(files: &[FileMeta]) -> Result<String> {
    let raw = RawCatalog {
        version: CATALOG_SCHEMA_VERSION,
        files: files.iter().map(RawFileMeta::from).collect(),
    };
    Ok(serde_json::to_string(&raw)?)
}

/// Clamp and sanitize a display name: control characters stripped, length
/// clamped, empty input replaced by the default name.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !ch.is_control())
        .take(MAX_FILE_NAME_CHARS)
        .collect();

    if cleaned.trim().is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

fn normalize_entries(entries: &[FileMeta], now: i64) -> Vec<FileMeta> {
    entries
        .iter()
        .map(|entry| normalize_file_meta(entry, now))
        .collect()
}

fn normalize_file_meta(entry: &FileMeta, now: i64) -> FileMeta {
    let backfill = |value: i64| if value > 0 { value } else { now };
    FileMeta {
        id: entry.id.clone(),
        name: sanitize_file_name(&entry.name),
        created_at: backfill(entry.created_at),
        updated_at: backfill(entry.updated_at),
        renamed_at: backfill(entry.renamed_at),
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RawCatalog {
    version: u32,
    #[serde(default)]
    files: Vec<RawFileMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileMeta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    renamed_at: Option<i64>,
}

impl RawFileMeta {
    fn into_file_meta(self, now: i64) -> Option<FileMeta> {
        let id = FileId::parse(self.id.as_deref().unwrap_or_default())?;
        Some(FileMeta {
            id,
            name: sanitize_file_name(self.name.as_deref().unwrap_or_default()),
            created_at: self.created_at.filter(|value| *value > 0).unwrap_or(now),
            updated_at: self.updated_at.filter(|value| *value > 0).unwrap_or(now),
            renamed_at: self.renamed_at.filter(|value| *value > 0).unwrap_or(now),
        })
    }
}

impl From<&FileMeta> for RawFileMeta {
    fn from(value: &FileMeta) -> Self {
        Self {
            id: Some(value.id.as_str().to_string()),
            name: Some(value.name.clone()),
            created_at: Some(value.created_at),
            updated_at: Some(value.updated_at),
            renamed_at: Some(value.renamed_at),
        }
    }
}
