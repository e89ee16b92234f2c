//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::FileId;

/// A merge that could not auto-resolve, awaiting user arbitration.
///
/// Ephemeral: created when a sync attempt detects a true conflict, destroyed
/// on resolution or cancellation. Nothing is persisted or uploaded while one
/// of these is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictState {
    /// Document involved in the conflict
    pub file_id: FileId,
    /// Display name at the time the conflict was detected
    pub file_name: String,
    /// Merge ancestor text
    pub base: String,
    /// Local draft text
    pub local: String,
    /// Remote copy text
    pub remote: String,
    /// User-chosen resolution text, once composed
    pub resolved: Option<String>,
    /// Why the merge could not auto-resolve
    pub reason: String,
}

impl ConflictState {
    /// Create a conflict awaiting resolution.
    #[must_use]
    pub fn new(
        file_id: FileId,
        file_name: impl Into<String>,
        base: impl Into<String>,
        local: impl Into<String>,
        remote: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            base: base.into(),
            local: local.into(),
            remote: remote.into(),
            resolved: None,
            reason: reason.into(),
        }
    }
}
