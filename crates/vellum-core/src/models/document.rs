//! Document model

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a document.
///
/// New ids are UUID v7 (time-sortable), but ids read from a remote catalog
/// are treated as opaque strings so manifests written by other clients stay
/// addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Create a new unique file ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parse an id from untrusted input.
    ///
    /// Returns `None` when the trimmed value is empty.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document draft and its sync bookkeeping.
///
/// `base_text` always equals the last text both replicas agreed on; it is
/// advanced only after a clean merge or an explicit conflict resolution,
/// never speculatively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier
    pub file_id: FileId,
    /// Current local draft text
    pub text: String,
    /// Last local mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Last successful sync timestamp (Unix ms); `None` before the first sync
    pub last_synced_at: Option<i64>,
    /// Last mutually agreed text (three-way merge ancestor)
    pub base_text: String,
    /// Remote revision token matching `base_text`; `None` before the first sync
    pub remote_revision: Option<String>,
}

impl DocumentRecord {
    /// Create a record for a document's first local write.
    #[must_use]
    pub fn new(file_id: FileId, text: impl Into<String>) -> Self {
        Self {
            file_id,
            text: text.into(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            last_synced_at: None,
            base_text: String::new(),
            remote_revision: None,
        }
    }

    /// Whether this record has ever agreed on a base with the remote copy.
    #[must_use]
    pub fn has_prior_base(&self) -> bool {
        self.last_synced_at.is_some()
            || self.remote_revision.is_some()
            || !self.base_text.is_empty()
    }

    /// Replace the draft text, bumping `updated_at`.
    pub fn apply_local_edit(&mut self, text: impl Into<String>, now: i64) {
        self.text = text.into();
        self.updated_at = now;
    }

    /// Advance the agreed base after a clean merge or a resolution.
    pub fn mark_synced(&mut self, merged: impl Into<String>, revision: String, now: i64) {
        let merged = merged.into();
        self.text.clone_from(&merged);
        self.base_text = merged;
        self.remote_revision = Some(revision);
        self.last_synced_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_unique() {
        assert_ne!(FileId::new(), FileId::new());
    }

    #[test]
    fn file_id_parse_rejects_blank() {
        assert_eq!(FileId::parse("   "), None);
        assert_eq!(
            FileId::parse(" doc-1 "),
            Some(FileId("doc-1".to_string()))
        );
    }

    #[test]
    fn new_record_has_no_base() {
        let record = DocumentRecord::new(FileId::new(), "Hello");
        assert!(!record.has_prior_base());
        assert_eq!(record.base_text, "");
        assert_eq!(record.remote_revision, None);
        assert_eq!(record.last_synced_at, None);
    }

    #[test]
    fn mark_synced_advances_base_and_text() {
        let mut record = DocumentRecord::new(FileId::new(), "draft");
        record.mark_synced("merged", "rev-2".to_string(), 42);

        assert_eq!(record.text, "merged");
        assert_eq!(record.base_text, "merged");
        assert_eq!(record.remote_revision.as_deref(), Some("rev-2"));
        assert_eq!(record.last_synced_at, Some(42));
        assert!(record.has_prior_base());
    }

    #[test]
    fn apply_local_edit_bumps_updated_at() {
        let mut record = DocumentRecord::new(FileId::new(), "a");
        record.apply_local_edit("b", 99);
        assert_eq!(record.text, "b");
        assert_eq!(record.updated_at, 99);
        // local edits never touch the agreed base
        assert_eq!(record.base_text, "");
    }
}
