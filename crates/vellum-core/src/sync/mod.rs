//! Sync orchestration.
//!
//! The only component with side effects: sequences token validation,
//! download, merge (with first-sync protection), upload, catalog refresh,
//! and local persistence. Everything else in the engine is pure computation
//! it calls into. One orchestrator owns one workspace; callers consume the
//! explicit result values it returns instead of observing callbacks.

use futures::stream::{self, StreamExt};

use crate::auth::{OAuthClient, TokenState};
use crate::catalog::{
    self, merge_file_catalogs, parse_remote_catalog, serialize_remote_catalog, FileMeta,
    WorkspaceManifest, DEFAULT_FILE_NAME,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::merge::{merge_three_way, MergeOutcome};
use crate::models::{ConflictState, DocumentRecord, FileId};
use crate::remote::{RemoteDocument, RemoteStore};
use crate::store::LocalStore;
use crate::util::unix_timestamp_ms;

/// Newly-discovered remote files hydrated per catalog refresh, concurrently.
const HYDRATION_CONCURRENCY: usize = 4;

const NOTICE_NOT_CONNECTED: &str = "Not connected to Dropbox. Connect to start syncing.";
const NOTICE_OFFLINE: &str = "Offline. Changes will sync when the connection returns.";
const NOTICE_NO_ACTIVE_FILE: &str = "No active document to sync.";
const NOTICE_SYNC_RUNNING: &str = "A sync is already running.";
const NOTICE_PULL_RUNNING: &str = "A pull is already running.";
const NOTICE_RECONNECT: &str = "Dropbox session expired. Reconnect to continue syncing.";
const NOTICE_NO_CONFLICT: &str = "No conflict to resolve.";

const FIRST_SYNC_CONFLICT_REASON: &str =
    "Local and remote copies both contain content from before the first sync.";

/// Terminal status of one sync, pull, or resolve attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Completed without user arbitration
    Clean,
    /// Stopped on a conflict awaiting resolution
    Conflict,
    /// Preconditions not met; nothing happened
    Skipped,
    /// An operation failed; safe to re-invoke
    Error,
}

/// Outcome of one orchestrator call, consumed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub status: SyncStatus,
    /// Short human-readable notice; never a raw stack trace
    pub notice: Option<String>,
    pub conflict: Option<ConflictState>,
}

impl SyncResult {
    fn clean(notice: Option<String>) -> Self {
        Self {
            status: SyncStatus::Clean,
            notice,
            conflict: None,
        }
    }

    fn skipped(notice: &str) -> Self {
        Self {
            status: SyncStatus::Skipped,
            notice: Some(notice.to_string()),
            conflict: None,
        }
    }

    fn error(notice: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            notice: Some(notice.into()),
            conflict: None,
        }
    }

    fn conflict(conflict: ConflictState) -> Self {
        Self {
            status: SyncStatus::Conflict,
            notice: Some(conflict.reason.clone()),
            conflict: Some(conflict),
        }
    }
}

/// Whether text has content beyond structural markdown placeholders.
///
/// A freshly created document often holds an empty heading or list marker;
/// those lines do not count as content when deciding whether two replicas
/// truly diverge.
#[must_use]
pub fn has_meaningful_content(text: &str) -> bool {
    text.lines().any(line_has_content)
}

fn line_has_content(line: &str) -> bool {
    let stripped = line
        .trim()
        .trim_start_matches(|ch: char| matches!(ch, '#' | '>' | '-' | '*' | '+' | '`' | '|' | ' ' | '\t'));

    // a bare ordered-list marker ("1.", "12.") is still a placeholder
    let stripped = stripped.strip_suffix('.').map_or(stripped, |rest| {
        if !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()) {
            ""
        } else {
            stripped
        }
    });

    !stripped.trim().is_empty()
}

/// Top-level sync state machine for one workspace.
pub struct SyncOrchestrator<R: RemoteStore, S: LocalStore> {
    remote: R,
    store: S,
    auth: OAuthClient,
    config: EngineConfig,
    active_file_id: Option<FileId>,
    online: bool,
    sync_in_flight: bool,
    pull_in_flight: bool,
    conflict: Option<ConflictState>,
}

impl<R: RemoteStore, S: LocalStore> SyncOrchestrator<R, S> {
    #[must_use]
    pub fn new(remote: R, store: S, auth: OAuthClient, config: EngineConfig) -> Self {
        Self {
            remote,
            store,
            auth,
            config,
            active_file_id: None,
            online: true,
            sync_in_flight: false,
            pull_in_flight: false,
            conflict: None,
        }
    }

    #[must_use]
    pub fn active_file_id(&self) -> Option<&FileId> {
        self.active_file_id.as_ref()
    }

    #[must_use]
    pub fn conflict(&self) -> Option<&ConflictState> {
        self.conflict.as_ref()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Load the workspace, creating the bootstrap placeholder document on a
    /// fresh device.
    pub fn bootstrap_workspace(&mut self) -> Result<WorkspaceManifest> {
        if let Some(manifest) = self.store.get_workspace()? {
            if self.active_file_id.is_none() {
                self.active_file_id.clone_from(&manifest.active_file_id);
            }
            return Ok(manifest);
        }

        let meta = FileMeta::new(DEFAULT_FILE_NAME);
        self.store
            .put_document(&DocumentRecord::new(meta.id.clone(), ""))?;
        let manifest = WorkspaceManifest {
            active_file_id: Some(meta.id.clone()),
            files: vec![meta],
        };
        self.store.put_workspace(&manifest)?;
        self.active_file_id.clone_from(&manifest.active_file_id);
        Ok(manifest)
    }

    /// Switch the active document.
    ///
    /// The outgoing document's draft is durably persisted first, so results
    /// of any still-running operation against it cannot corrupt the newly
    /// active one.
    pub fn set_active_file(&mut self, file_id: FileId, outgoing_text: Option<&str>) -> Result<()> {
        if let (Some(current), Some(text)) = (self.active_file_id.clone(), outgoing_text) {
            self.record_local_edit(&current, text)?;
        }

        self.active_file_id = Some(file_id.clone());
        if let Some(mut manifest) = self.store.get_workspace()? {
            manifest.active_file_id = Some(file_id);
            self.store.put_workspace(&manifest)?;
        }
        Ok(())
    }

    /// Persist a local draft edit, creating the record on first write.
    pub fn record_local_edit(&self, file_id: &FileId, text: &str) -> Result<()> {
        let mut record = self
            .store
            .get_document(file_id)?
            .unwrap_or_else(|| DocumentRecord::new(file_id.clone(), ""));
        record.apply_local_edit(text, unix_timestamp_ms());
        self.store.put_document(&record)?;

        if let Some(mut manifest) = self.store.get_workspace()? {
            if let Some(file) = manifest.files.iter_mut().find(|file| file.id == *file_id) {
                file.updated_at = record.updated_at;
                self.store.put_workspace(&manifest)?;
            }
        }
        Ok(())
    }

    /// Create a new empty document and add it to the catalog.
    pub fn create_file(&self, name: &str) -> Result<FileMeta> {
        let meta = FileMeta::new(name);
        self.store
            .put_document(&DocumentRecord::new(meta.id.clone(), ""))?;

        let mut manifest = self.store.get_workspace()?.unwrap_or_default();
        manifest.files.push(meta.clone());
        self.store.put_workspace(&manifest)?;
        Ok(meta)
    }

    /// Rename a document, bumping `renamed_at` for last-writer-wins.
    pub fn rename_file(&self, file_id: &FileId, name: &str) -> Result<FileMeta> {
        let mut manifest = self.store.get_workspace()?.unwrap_or_default();
        let file = manifest
            .files
            .iter_mut()
            .find(|file| file.id == *file_id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown document: {file_id}")))?;

        let now = unix_timestamp_ms();
        file.name = catalog::sanitize_file_name(name);
        file.renamed_at = now;
        file.updated_at = now;
        let renamed = file.clone();
        self.store.put_workspace(&manifest)?;
        Ok(renamed)
    }

    /// Explicitly delete a document: catalog entry, local record, and (best
    /// effort) the remote blob plus the remote catalog entry.
    pub async fn delete_file(&mut self, file_id: &FileId) -> Result<()> {
        let mut manifest = self.store.get_workspace()?.unwrap_or_default();
        manifest.files.retain(|file| file.id != *file_id);
        if manifest.active_file_id.as_ref() == Some(file_id) {
            manifest.active_file_id = manifest.files.first().map(|file| file.id.clone());
        }
        self.store.put_workspace(&manifest)?;
        self.store.delete_document(file_id)?;

        if self.active_file_id.as_ref() == Some(file_id) {
            self.active_file_id.clone_from(&manifest.active_file_id);
        }
        if self
            .conflict
            .as_ref()
            .is_some_and(|conflict| conflict.file_id == *file_id)
        {
            self.conflict = None;
        }

        if self.online {
            if let Some(token) = self.store.get_token()? {
                let token = self.fresh_token(token).await?;
                let path = self.config.layout.document_path(file_id);
                if let Err(error) = self.remote.delete(&token.access_token, &path).await {
                    tracing::warn!("Failed to delete remote copy of {file_id}: {error}");
                }
                let serialized = serialize_remote_catalog(&manifest.files)?;
                if let Err(error) = self
                    .remote
                    .upload(&token.access_token, &self.config.layout.catalog_path, &serialized)
                    .await
                {
                    tracing::warn!("Failed to update remote catalog after delete: {error}");
                }
            }
        }
        Ok(())
    }

    /// Report connectivity. An offline-to-online transition with a stored
    /// token and an active document triggers one sync attempt - edge
    /// triggered, never repeated while staying online.
    pub async fn set_online(&mut self, online: bool) -> Option<SyncResult> {
        let was_online = self.online;
        self.online = online;
        if !online || was_online {
            return None;
        }

        let has_token = matches!(self.store.get_token(), Ok(Some(_)));
        if !has_token || self.active_file_id.is_none() {
            return None;
        }
        Some(self.sync_active().await)
    }

    /// Sync the active document.
    pub async fn sync_active(&mut self) -> SyncResult {
        match self.active_file_id.clone() {
            Some(file_id) => self.sync_file(file_id).await,
            None => SyncResult::skipped(NOTICE_NO_ACTIVE_FILE),
        }
    }

    /// Run one sync attempt for a document.
    pub async fn sync_file(&mut self, file_id: FileId) -> SyncResult {
        if self.sync_in_flight {
            return SyncResult::skipped(NOTICE_SYNC_RUNNING);
        }

        self.sync_in_flight = true;
        let attempt = self.sync_file_inner(&file_id).await;
        self.sync_in_flight = false;

        match attempt {
            Ok(result) => result,
            Err(error) => self.notice_from_error(&error),
        }
    }

    /// Apply a user-chosen resolution for the outstanding conflict: upload
    /// it unconditionally, persist it as the new base, clear the conflict.
    pub async fn resolve_conflict(&mut self, resolved: String) -> SyncResult {
        if self.sync_in_flight {
            return SyncResult::skipped(NOTICE_SYNC_RUNNING);
        }
        let Some(mut conflict) = self.conflict.clone() else {
            return SyncResult::skipped(NOTICE_NO_CONFLICT);
        };
        conflict.resolved = Some(resolved.clone());
        self.conflict = Some(conflict.clone());

        self.sync_in_flight = true;
        let attempt = self.resolve_conflict_inner(&conflict, resolved).await;
        self.sync_in_flight = false;

        match attempt {
            Ok(result) => {
                if result.status == SyncStatus::Clean {
                    self.conflict = None;
                }
                result
            }
            Err(error) => self.notice_from_error(&error),
        }
    }

    /// Drop the outstanding conflict without resolving it.
    pub fn dismiss_conflict(&mut self) -> Option<ConflictState> {
        self.conflict.take()
    }

    /// Re-install a conflict captured earlier. Callers that outlive one
    /// process (like the CLI) park the conflict in their own storage and
    /// restore it before resolving.
    pub fn restore_conflict(&mut self, conflict: ConflictState) {
        self.conflict = Some(conflict);
    }

    /// Adopt the remote copy of a document wholesale.
    pub async fn pull_file(&mut self, file_id: FileId) -> SyncResult {
        if self.pull_in_flight {
            return SyncResult::skipped(NOTICE_PULL_RUNNING);
        }

        self.pull_in_flight = true;
        let attempt = self.pull_file_inner(&file_id).await;
        self.pull_in_flight = false;

        match attempt {
            Ok(result) => result,
            Err(error) => self.notice_from_error(&error),
        }
    }

    /// Reconcile the catalog with the remote manifest and hydrate newly
    /// discovered files. Requires a connection.
    pub async fn refresh_catalog(&mut self) -> Result<WorkspaceManifest> {
        let Some(token) = self.store.get_token()? else {
            return Err(Error::InvalidInput(NOTICE_NOT_CONNECTED.to_string()));
        };
        if !self.online {
            return Err(Error::InvalidInput(NOTICE_OFFLINE.to_string()));
        }
        let token = self.fresh_token(token).await?;
        self.refresh_catalog_with_token(&token).await
    }

    /// Whether the remote copy of a document has changes the local replica
    /// has not seen. Detection only; never forces a sync.
    pub async fn remote_ahead(&self, file_id: &FileId) -> Result<bool> {
        let Some(token) = self.store.get_token()? else {
            return Ok(false);
        };
        if !self.online {
            return Ok(false);
        }
        let token = self.fresh_token(token).await?;

        let record = self
            .store
            .get_document(file_id)?
            .unwrap_or_else(|| DocumentRecord::new(file_id.clone(), ""));
        let path = self.config.layout.document_path(file_id);
        match self.remote.get_metadata(&token.access_token, &path).await? {
            None => Ok(false),
            Some(metadata) => Ok(catalog::remote_is_ahead(
                &record,
                &metadata,
                self.config.clock_skew_tolerance_ms,
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn sync_file_inner(&mut self, file_id: &FileId) -> Result<SyncResult> {
        let Some(token) = self.store.get_token()? else {
            return Ok(SyncResult::skipped(NOTICE_NOT_CONNECTED));
        };
        if !self.online {
            return Ok(SyncResult::skipped(NOTICE_OFFLINE));
        }
        let token = self.fresh_token(token).await?;

        let record = self
            .store
            .get_document(file_id)?
            .unwrap_or_else(|| DocumentRecord::new(file_id.clone(), ""));

        let path = self.config.layout.document_path(file_id);
        let downloaded = self.remote.download(&token.access_token, &path).await?;
        // a missing remote file is empty content, not an error
        let remote_exists = downloaded.is_some();
        let (remote_text, remote_revision) = match downloaded {
            Some(document) => (document.content, Some(document.revision)),
            None => (String::new(), None),
        };

        // First-sync protection: with no prior base and independent content
        // on both sides, neither replica is authoritative - ask the user
        // instead of guessing.
        if !record.has_prior_base()
            && remote_exists
            && record.text != remote_text
            && has_meaningful_content(&record.text)
            && has_meaningful_content(&remote_text)
        {
            return Ok(self.enter_conflict(
                file_id,
                &record,
                remote_text,
                FIRST_SYNC_CONFLICT_REASON.to_string(),
            ));
        }

        match merge_three_way(&record.base_text, &record.text, &remote_text) {
            MergeOutcome::Conflict { reason, .. } => {
                // no local or remote mutation on conflict
                Ok(self.enter_conflict(file_id, &record, remote_text, reason.to_string()))
            }
            MergeOutcome::Clean(merged) => {
                let revision = if remote_exists && merged == remote_text {
                    remote_revision.unwrap_or_default()
                } else {
                    self.remote
                        .upload(&token.access_token, &path, &merged)
                        .await?
                };

                let mut record = record;
                record.mark_synced(merged, revision, unix_timestamp_ms());
                self.store.put_document(&record)?;

                // catalog runs alongside document sync; a failure here must
                // not undo a completed document sync
                let notice = match self.refresh_catalog_with_token(&token).await {
                    Ok(_) => None,
                    Err(error) if error.is_auth_failure() => return Err(error),
                    Err(error) => {
                        tracing::warn!("Catalog refresh failed after sync: {error}");
                        Some("Synced, but the catalog could not be refreshed.".to_string())
                    }
                };
                Ok(SyncResult::clean(notice))
            }
        }
    }

    async fn resolve_conflict_inner(
        &mut self,
        conflict: &ConflictState,
        resolved: String,
    ) -> Result<SyncResult> {
        let Some(token) = self.store.get_token()? else {
            return Ok(SyncResult::skipped(NOTICE_NOT_CONNECTED));
        };
        if !self.online {
            return Ok(SyncResult::skipped(NOTICE_OFFLINE));
        }
        let token = self.fresh_token(token).await?;

        let path = self.config.layout.document_path(&conflict.file_id);
        let revision = self
            .remote
            .upload(&token.access_token, &path, &resolved)
            .await?;

        let mut record = self
            .store
            .get_document(&conflict.file_id)?
            .unwrap_or_else(|| DocumentRecord::new(conflict.file_id.clone(), ""));
        record.mark_synced(resolved, revision, unix_timestamp_ms());
        self.store.put_document(&record)?;
        Ok(SyncResult::clean(None))
    }

    async fn pull_file_inner(&mut self, file_id: &FileId) -> Result<SyncResult> {
        let Some(token) = self.store.get_token()? else {
            return Ok(SyncResult::skipped(NOTICE_NOT_CONNECTED));
        };
        if !self.online {
            return Ok(SyncResult::skipped(NOTICE_OFFLINE));
        }
        let token = self.fresh_token(token).await?;

        let path = self.config.layout.document_path(file_id);
        match self.remote.download(&token.access_token, &path).await? {
            None => Ok(SyncResult::skipped(
                "No remote copy exists for this document.",
            )),
            Some(document) => {
                let mut record = self
                    .store
                    .get_document(file_id)?
                    .unwrap_or_else(|| DocumentRecord::new(file_id.clone(), ""));
                record.mark_synced(document.content, document.revision, unix_timestamp_ms());
                self.store.put_document(&record)?;
                Ok(SyncResult::clean(None))
            }
        }
    }

    async fn refresh_catalog_with_token(
        &mut self,
        token: &TokenState,
    ) -> Result<WorkspaceManifest> {
        let now = unix_timestamp_ms();
        let catalog_path = self.config.layout.catalog_path.clone();

        let remote_files = match self
            .remote
            .download(&token.access_token, &catalog_path)
            .await?
        {
            Some(document) => match parse_remote_catalog(&document.content, now) {
                Ok(files) => files,
                Err(error) => {
                    // a malformed manifest degrades to an empty list rather
                    // than aborting sync
                    tracing::warn!("Ignoring malformed remote catalog: {error}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let local_manifest = self.store.get_workspace()?.unwrap_or_default();
        let disposable = self.disposable_placeholder(&local_manifest)?;
        let merged = merge_file_catalogs(
            &local_manifest.files,
            &remote_files,
            disposable.as_ref(),
            now,
        );

        if let Some(placeholder) = &disposable {
            if !merged.iter().any(|file| file.id == *placeholder) {
                self.store.delete_document(placeholder)?;
            }
        }

        self.hydrate_missing_documents(token, &merged).await?;

        // write the catalog back only when reconciliation actually changed it
        if merged != remote_files {
            let serialized = serialize_remote_catalog(&merged)?;
            self.remote
                .upload(&token.access_token, &catalog_path, &serialized)
                .await?;
        }

        let mut manifest = WorkspaceManifest {
            files: merged,
            active_file_id: local_manifest.active_file_id,
        };
        let active_is_known = manifest
            .active_file_id
            .as_ref()
            .is_some_and(|id| manifest.file(id).is_some());
        if !active_is_known {
            manifest.active_file_id = manifest.files.first().map(|file| file.id.clone());
        }
        self.store.put_workspace(&manifest)?;

        if self
            .active_file_id
            .as_ref()
            .is_some_and(|id| manifest.file(id).is_none())
        {
            self.active_file_id.clone_from(&manifest.active_file_id);
        }
        Ok(manifest)
    }

    /// Download bodies for catalog entries with no local record yet, a
    /// bounded number at a time. Hydrated records adopt the remote content
    /// as their base. Individual failures are left for the next refresh.
    async fn hydrate_missing_documents(
        &mut self,
        token: &TokenState,
        files: &[FileMeta],
    ) -> Result<()> {
        let mut missing: Vec<FileId> = Vec::new();
        for file in files {
            if self.store.get_document(&file.id)?.is_none() {
                missing.push(file.id.clone());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let remote = &self.remote;
        let layout = &self.config.layout;
        let access = token.access_token.as_str();
        let downloads: Vec<(FileId, Result<Option<RemoteDocument>>)> = stream::iter(missing)
            .map(|file_id| {
                let path = layout.document_path(&file_id);
                async move {
                    let result = remote.download(access, &path).await;
                    (file_id, result)
                }
            })
            .buffer_unordered(HYDRATION_CONCURRENCY)
            .collect()
            .await;

        let now = unix_timestamp_ms();
        for (file_id, downloaded) in downloads {
            match downloaded {
                Ok(Some(document)) => {
                    let mut record = DocumentRecord::new(file_id, "");
                    record.mark_synced(document.content, document.revision, now);
                    self.store.put_document(&record)?;
                }
                Ok(None) => {
                    self.store.put_document(&DocumentRecord::new(file_id, ""))?;
                }
                Err(error) if error.is_auth_failure() => return Err(error),
                Err(error) => {
                    tracing::warn!("Failed to hydrate document {file_id}: {error}");
                }
            }
        }
        Ok(())
    }

    fn enter_conflict(
        &mut self,
        file_id: &FileId,
        record: &DocumentRecord,
        remote_text: String,
        reason: String,
    ) -> SyncResult {
        let file_name = self
            .store
            .get_workspace()
            .ok()
            .flatten()
            .map_or_else(|| DEFAULT_FILE_NAME.to_string(), |manifest| manifest.file_name(file_id));

        let conflict = ConflictState::new(
            file_id.clone(),
            file_name,
            record.base_text.clone(),
            record.text.clone(),
            remote_text,
            reason,
        );
        self.conflict = Some(conflict.clone());
        SyncResult::conflict(conflict)
    }

    async fn fresh_token(&self, token: TokenState) -> Result<TokenState> {
        if !token.is_expiring() {
            return Ok(token);
        }
        let refreshed = self.auth.refresh(&token).await?;
        self.store.put_token(Some(&refreshed))?;
        Ok(refreshed)
    }

    fn notice_from_error(&self, error: &Error) -> SyncResult {
        if error.is_auth_failure() {
            // no silent retry loop: drop the token and force an explicit
            // reconnect
            if let Err(store_error) = self.store.put_token(None) {
                tracing::warn!("Failed to clear stored token: {store_error}");
            }
            tracing::warn!("Cleared stored token after auth failure: {error}");
            return SyncResult::error(NOTICE_RECONNECT);
        }
        SyncResult::error(error.to_string())
    }

    fn disposable_placeholder(&self, manifest: &WorkspaceManifest) -> Result<Option<FileId>> {
        if manifest.files.len() != 1 {
            return Ok(None);
        }
        let file = &manifest.files[0];
        if file.name != DEFAULT_FILE_NAME {
            return Ok(None);
        }

        let disposable = match self.store.get_document(&file.id)? {
            None => true,
            Some(record) => !record.has_prior_base() && !has_meaningful_content(&record.text),
        };
        Ok(disposable.then(|| file.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::config::OAuthConfig;
    use crate::remote::RemoteMetadata;
    use crate::util::unix_timestamp_now;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        documents: Mutex<HashMap<FileId, DocumentRecord>>,
        workspace: Mutex<Option<WorkspaceManifest>>,
        token: Mutex<Option<TokenState>>,
    }

    impl LocalStore for MemoryStore {
        fn get_document(&self, file_id: &FileId) -> Result<Option<DocumentRecord>> {
            Ok(self.documents.lock().unwrap().get(file_id).cloned())
        }

        fn put_document(&self, record: &DocumentRecord) -> Result<()> {
            self.documents
                .lock()
                .unwrap()
                .insert(record.file_id.clone(), record.clone());
            Ok(())
        }

        fn delete_document(&self, file_id: &FileId) -> Result<()> {
            self.documents.lock().unwrap().remove(file_id);
            Ok(())
        }

        fn get_workspace(&self) -> Result<Option<WorkspaceManifest>> {
            Ok(self.workspace.lock().unwrap().clone())
        }

        fn put_workspace(&self, manifest: &WorkspaceManifest) -> Result<()> {
            *self.workspace.lock().unwrap() = Some(manifest.clone());
            Ok(())
        }

        fn get_token(&self) -> Result<Option<TokenState>> {
            Ok(self.token.lock().unwrap().clone())
        }

        fn put_token(&self, token: Option<&TokenState>) -> Result<()> {
            *self.token.lock().unwrap() = token.cloned();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        files: Mutex<HashMap<String, RemoteDocument>>,
        fail_downloads: Mutex<Option<String>>,
        uploads: Mutex<Vec<String>>,
        revision_counter: AtomicUsize,
    }

    impl FakeRemote {
        fn seed(&self, path: &str, content: &str, revision: &str) {
            self.files.lock().unwrap().insert(
                path.to_string(),
                RemoteDocument {
                    content: content.to_string(),
                    revision: revision.to_string(),
                },
            );
        }

        fn content(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|document| document.content.clone())
        }

        fn uploads_to(&self, path: &str) -> usize {
            self.uploads
                .lock()
                .unwrap()
                .iter()
                .filter(|uploaded| uploaded.as_str() == path)
                .count()
        }

        fn fail_downloads_with(&self, message: &str) {
            *self.fail_downloads.lock().unwrap() = Some(message.to_string());
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn download(&self, _token: &str, path: &str) -> Result<Option<RemoteDocument>> {
            if let Some(message) = self.fail_downloads.lock().unwrap().clone() {
                return Err(Error::Remote(message));
            }
            Ok(self.files.lock().unwrap().get(path).cloned())
        }

        async fn upload(&self, _token: &str, path: &str, content: &str) -> Result<String> {
            let revision = format!(
                "rev-{}",
                self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1
            );
            self.files.lock().unwrap().insert(
                path.to_string(),
                RemoteDocument {
                    content: content.to_string(),
                    revision: revision.clone(),
                },
            );
            self.uploads.lock().unwrap().push(path.to_string());
            Ok(revision)
        }

        async fn delete(&self, _token: &str, path: &str) -> Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }

        async fn get_metadata(&self, _token: &str, path: &str) -> Result<Option<RemoteMetadata>> {
            Ok(self.files.lock().unwrap().get(path).map(|document| {
                RemoteMetadata {
                    revision: document.revision.clone(),
                    server_modified_at: 0,
                }
            }))
        }
    }

    fn oauth_client() -> OAuthClient {
        OAuthClient::new(
            OAuthConfig::with_endpoints(
                "app-key",
                "https://localhost:8080/callback",
                "https://auth.example.com/authorize",
                "https://auth.example.com/token",
                "files.content.read files.content.write",
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn valid_token() -> TokenState {
        TokenState {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: unix_timestamp_now() + 3_600,
            account_id: Some("acct".to_string()),
        }
    }

    fn orchestrator() -> SyncOrchestrator<FakeRemote, MemoryStore> {
        SyncOrchestrator::new(
            FakeRemote::default(),
            MemoryStore::default(),
            oauth_client(),
            EngineConfig::default(),
        )
    }

    fn connected_orchestrator() -> SyncOrchestrator<FakeRemote, MemoryStore> {
        let engine = orchestrator();
        engine.store.put_token(Some(&valid_token())).unwrap();
        engine
    }

    fn file(engine: &SyncOrchestrator<FakeRemote, MemoryStore>, name: &str) -> FileId {
        engine.create_file(name).unwrap().id
    }

    fn document_path(file_id: &FileId) -> String {
        format!("/documents/{file_id}.md")
    }

    fn record(
        engine: &SyncOrchestrator<FakeRemote, MemoryStore>,
        file_id: &FileId,
    ) -> DocumentRecord {
        engine
            .store
            .get_document(file_id)
            .unwrap()
            .expect("record should exist")
    }

    #[tokio::test]
    async fn sync_skips_without_token() {
        let mut engine = orchestrator();
        let file_id = file(&engine, "Notes");

        let result = engine.sync_file(file_id).await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert!(result.notice.unwrap().contains("Not connected"));
    }

    #[tokio::test]
    async fn sync_skips_while_offline() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.set_online(false).await;

        let result = engine.sync_file(file_id).await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert!(result.notice.unwrap().contains("Offline"));
    }

    #[tokio::test]
    async fn sync_without_active_file_is_skipped() {
        let mut engine = connected_orchestrator();
        let result = engine.sync_active().await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert!(result.notice.unwrap().contains("No active document"));
    }

    #[tokio::test]
    async fn reentrant_sync_is_rejected() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");

        engine.sync_in_flight = true;
        let result = engine.sync_file(file_id).await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert!(result.notice.unwrap().contains("already running"));
    }

    #[tokio::test]
    async fn first_sync_with_missing_remote_uploads_draft() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "Hello from local").unwrap();

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Clean);

        let synced = record(&engine, &file_id);
        assert_eq!(synced.base_text, "Hello from local");
        assert!(synced.last_synced_at.is_some());
        assert_eq!(
            engine.remote.content(&document_path(&file_id)).as_deref(),
            Some("Hello from local")
        );
    }

    #[tokio::test]
    async fn first_sync_protection_forces_conflict() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "Hello").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "World", "rev-remote");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Conflict);
        let conflict = result.conflict.expect("conflict state");
        assert_eq!(conflict.local, "Hello");
        assert_eq!(conflict.remote, "World");
        assert!(conflict.reason.contains("first sync"));

        // no local or remote mutation occurred
        let untouched = record(&engine, &file_id);
        assert_eq!(untouched.text, "Hello");
        assert_eq!(untouched.base_text, "");
        assert_eq!(untouched.last_synced_at, None);
        assert_eq!(engine.remote.uploads_to(&document_path(&file_id)), 0);
        assert_eq!(
            engine.remote.content(&document_path(&file_id)).as_deref(),
            Some("World")
        );
    }

    #[tokio::test]
    async fn first_sync_with_untouched_local_adopts_remote() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine
            .remote
            .seed(&document_path(&file_id), "Real remote notes", "rev-remote");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Clean);

        let adopted = record(&engine, &file_id);
        assert_eq!(adopted.text, "Real remote notes");
        assert_eq!(adopted.remote_revision.as_deref(), Some("rev-remote"));
        // adopted verbatim; nothing re-uploaded
        assert_eq!(engine.remote.uploads_to(&document_path(&file_id)), 0);
    }

    #[tokio::test]
    async fn first_sync_placeholder_local_never_forces_first_sync_conflict() {
        // a structural placeholder is not "meaningful content", so a
        // diverging remote reaches the merger instead of the forced-conflict
        // path; the merger still gets the final say
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "# \n\n- ").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "Real remote notes", "rev-remote");

        let result = engine.sync_file(file_id.clone()).await;
        if let Some(conflict) = result.conflict {
            assert_ne!(conflict.reason, FIRST_SYNC_CONFLICT_REASON);
        }
    }

    #[tokio::test]
    async fn disjoint_edits_sync_cleanly() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");

        // establish a shared base first
        engine.record_local_edit(&file_id, "A\nB\nC").unwrap();
        assert_eq!(
            engine.sync_file(file_id.clone()).await.status,
            SyncStatus::Clean
        );

        // then diverge: local edits line one, remote edits line three
        engine.record_local_edit(&file_id, "A2\nB\nC").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "A\nB\nC2", "rev-remote-2");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Clean);

        let merged = record(&engine, &file_id);
        assert_eq!(merged.text, "A2\nB\nC2");
        assert_eq!(merged.base_text, "A2\nB\nC2");
        assert_eq!(
            engine.remote.content(&document_path(&file_id)).as_deref(),
            Some("A2\nB\nC2")
        );
    }

    #[tokio::test]
    async fn same_region_edits_conflict_without_mutation() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");

        engine.record_local_edit(&file_id, "A\nB\nC").unwrap();
        assert_eq!(
            engine.sync_file(file_id.clone()).await.status,
            SyncStatus::Clean
        );
        let uploads_after_first_sync = engine.remote.uploads_to(&document_path(&file_id));

        engine.record_local_edit(&file_id, "A\nX\nC").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "A\nY\nC", "rev-remote-2");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Conflict);
        let conflict = result.conflict.expect("conflict state");
        assert_eq!(conflict.reason, "Changes modify the same region.");
        assert_eq!(conflict.base, "A\nB\nC");

        assert_eq!(record(&engine, &file_id).text, "A\nX\nC");
        assert_eq!(
            engine.remote.uploads_to(&document_path(&file_id)),
            uploads_after_first_sync
        );
        assert!(engine.conflict().is_some());
    }

    #[tokio::test]
    async fn remote_only_changes_adopt_without_upload() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");

        engine.record_local_edit(&file_id, "A\nB").unwrap();
        assert_eq!(
            engine.sync_file(file_id.clone()).await.status,
            SyncStatus::Clean
        );
        let uploads_before = engine.remote.uploads_to(&document_path(&file_id));

        engine
            .remote
            .seed(&document_path(&file_id), "A\nB\nremote addition", "rev-9");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Clean);
        assert_eq!(record(&engine, &file_id).text, "A\nB\nremote addition");
        assert_eq!(record(&engine, &file_id).remote_revision.as_deref(), Some("rev-9"));
        // merged text equals what remote already holds; nothing re-uploaded
        assert_eq!(
            engine.remote.uploads_to(&document_path(&file_id)),
            uploads_before
        );
    }

    #[tokio::test]
    async fn resolve_conflict_uploads_and_clears() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");

        engine.record_local_edit(&file_id, "A\nB\nC").unwrap();
        engine.sync_file(file_id.clone()).await;
        engine.record_local_edit(&file_id, "A\nX\nC").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "A\nY\nC", "rev-remote-2");
        assert_eq!(
            engine.sync_file(file_id.clone()).await.status,
            SyncStatus::Conflict
        );

        let result = engine.resolve_conflict("A\nX\nY\nC".to_string()).await;
        assert_eq!(result.status, SyncStatus::Clean);
        assert!(engine.conflict().is_none());

        let resolved = record(&engine, &file_id);
        assert_eq!(resolved.text, "A\nX\nY\nC");
        assert_eq!(resolved.base_text, "A\nX\nY\nC");
        assert_eq!(
            engine.remote.content(&document_path(&file_id)).as_deref(),
            Some("A\nX\nY\nC")
        );
    }

    #[tokio::test]
    async fn resolve_without_conflict_is_skipped() {
        let mut engine = connected_orchestrator();
        let result = engine.resolve_conflict("anything".to_string()).await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert!(result.notice.unwrap().contains("No conflict"));
    }

    #[tokio::test]
    async fn auth_failure_clears_token_and_keeps_document() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "Important draft").unwrap();
        engine.remote.fail_downloads_with("expired_access_token/..");

        let result = engine.sync_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Error);
        assert!(result.notice.unwrap().contains("Reconnect"));

        assert!(engine.store.get_token().unwrap().is_none());
        assert_eq!(record(&engine, &file_id).text, "Important draft");
    }

    #[tokio::test]
    async fn network_failure_surfaces_notice_and_keeps_token() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.remote.fail_downloads_with("connection reset by peer");

        let result = engine.sync_file(file_id).await;
        assert_eq!(result.status, SyncStatus::Error);
        assert!(result.notice.unwrap().contains("connection reset"));
        assert!(engine.store.get_token().unwrap().is_some());
    }

    #[tokio::test]
    async fn offline_to_online_edge_triggers_one_sync() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.set_active_file(file_id, None).unwrap();
        engine.set_online(false).await;

        let fired = engine.set_online(true).await;
        assert!(fired.is_some());

        // level-triggered repeats must not happen
        assert!(engine.set_online(true).await.is_none());

        // a fresh transition fires again
        engine.set_online(false).await;
        assert!(engine.set_online(true).await.is_some());
    }

    #[tokio::test]
    async fn online_transition_without_token_stays_quiet() {
        let mut engine = orchestrator();
        let file_id = file(&engine, "Notes");
        engine.set_active_file(file_id, None).unwrap();
        engine.set_online(false).await;
        assert!(engine.set_online(true).await.is_none());
    }

    #[tokio::test]
    async fn pull_adopts_remote_copy() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "local draft").unwrap();
        engine
            .remote
            .seed(&document_path(&file_id), "remote wins", "rev-7");

        let result = engine.pull_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Clean);

        let pulled = record(&engine, &file_id);
        assert_eq!(pulled.text, "remote wins");
        assert_eq!(pulled.base_text, "remote wins");
        assert_eq!(pulled.remote_revision.as_deref(), Some("rev-7"));
    }

    #[tokio::test]
    async fn pull_of_missing_remote_is_skipped() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "local draft").unwrap();

        let result = engine.pull_file(file_id.clone()).await;
        assert_eq!(result.status, SyncStatus::Skipped);
        assert_eq!(record(&engine, &file_id).text, "local draft");
    }

    #[tokio::test]
    async fn catalog_refresh_discovers_and_hydrates_remote_files() {
        let mut engine = connected_orchestrator();
        engine.bootstrap_workspace().unwrap();
        let placeholder_id = engine.active_file_id().unwrap().clone();

        let remote_file = FileMeta::new("Travel Journal");
        let catalog_payload = serialize_remote_catalog(std::slice::from_ref(&remote_file)).unwrap();
        engine.remote.seed("/workspace.json", &catalog_payload, "rev-cat");
        engine.remote.seed(
            &document_path(&remote_file.id),
            "Day one: arrived.",
            "rev-doc",
        );

        let manifest = engine.refresh_catalog().await.unwrap();

        // the never-used bootstrap placeholder must not block discovery
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].id, remote_file.id);
        assert!(engine.store.get_document(&placeholder_id).unwrap().is_none());

        let hydrated = record(&engine, &remote_file.id);
        assert_eq!(hydrated.text, "Day one: arrived.");
        assert_eq!(hydrated.base_text, "Day one: arrived.");
        assert_eq!(hydrated.remote_revision.as_deref(), Some("rev-doc"));

        // the active pointer moved off the dropped placeholder
        assert_eq!(engine.active_file_id(), Some(&remote_file.id));
    }

    #[tokio::test]
    async fn catalog_refresh_keeps_placeholder_with_content() {
        let mut engine = connected_orchestrator();
        engine.bootstrap_workspace().unwrap();
        let placeholder_id = engine.active_file_id().unwrap().clone();
        engine
            .record_local_edit(&placeholder_id, "Real writing here")
            .unwrap();

        let remote_file = FileMeta::new("Travel Journal");
        let catalog_payload = serialize_remote_catalog(std::slice::from_ref(&remote_file)).unwrap();
        engine.remote.seed("/workspace.json", &catalog_payload, "rev-cat");
        engine
            .remote
            .seed(&document_path(&remote_file.id), "Day one.", "rev-doc");

        let manifest = engine.refresh_catalog().await.unwrap();
        assert_eq!(manifest.files.len(), 2);
        assert!(manifest.file(&placeholder_id).is_some());
    }

    #[tokio::test]
    async fn malformed_remote_catalog_degrades_to_empty() {
        let mut engine = connected_orchestrator();
        engine.bootstrap_workspace().unwrap();
        engine
            .remote
            .seed("/workspace.json", "{definitely not json", "rev-cat");

        let manifest = engine.refresh_catalog().await.unwrap();
        // local placeholder survives; the bad manifest is treated as empty
        assert_eq!(manifest.files.len(), 1);
    }

    #[tokio::test]
    async fn catalog_refresh_writes_back_merged_catalog() {
        let mut engine = connected_orchestrator();
        engine.bootstrap_workspace().unwrap();
        let placeholder_id = engine.active_file_id().unwrap().clone();
        engine
            .record_local_edit(&placeholder_id, "Keep me")
            .unwrap();

        let remote_file = FileMeta::new("Remote Doc");
        let catalog_payload = serialize_remote_catalog(std::slice::from_ref(&remote_file)).unwrap();
        engine.remote.seed("/workspace.json", &catalog_payload, "rev-cat");
        engine
            .remote
            .seed(&document_path(&remote_file.id), "body", "rev-doc");

        engine.refresh_catalog().await.unwrap();
        assert_eq!(engine.remote.uploads_to("/workspace.json"), 1);

        let written = engine.remote.content("/workspace.json").unwrap();
        let written_files = parse_remote_catalog(&written, 0).unwrap();
        assert_eq!(written_files.len(), 2);
    }

    #[tokio::test]
    async fn delete_file_removes_everywhere() {
        let mut engine = connected_orchestrator();
        engine.bootstrap_workspace().unwrap();
        let file_id = file(&engine, "Disposable");
        engine.record_local_edit(&file_id, "text").unwrap();
        engine.sync_file(file_id.clone()).await;
        assert!(engine.remote.content(&document_path(&file_id)).is_some());

        engine.delete_file(&file_id).await.unwrap();

        assert!(engine.store.get_document(&file_id).unwrap().is_none());
        assert!(engine.remote.content(&document_path(&file_id)).is_none());
        let manifest = engine.store.get_workspace().unwrap().unwrap();
        assert!(manifest.file(&file_id).is_none());
    }

    #[tokio::test]
    async fn rename_bumps_renamed_at() {
        let engine = connected_orchestrator();
        let file_id = file(&engine, "Old Name");
        let before = engine
            .store
            .get_workspace()
            .unwrap()
            .unwrap()
            .file(&file_id)
            .unwrap()
            .renamed_at;

        std::thread::sleep(std::time::Duration::from_millis(2));
        let renamed = engine.rename_file(&file_id, "New Name").unwrap();
        assert_eq!(renamed.name, "New Name");
        assert!(renamed.renamed_at > before);
    }

    #[tokio::test]
    async fn set_active_file_persists_outgoing_snapshot() {
        let mut engine = connected_orchestrator();
        let first = file(&engine, "First");
        let second = file(&engine, "Second");
        engine.set_active_file(first.clone(), None).unwrap();

        engine
            .set_active_file(second.clone(), Some("unsaved outgoing draft"))
            .unwrap();

        assert_eq!(record(&engine, &first).text, "unsaved outgoing draft");
        assert_eq!(engine.active_file_id(), Some(&second));
        let manifest = engine.store.get_workspace().unwrap().unwrap();
        assert_eq!(manifest.active_file_id, Some(second));
    }

    #[tokio::test]
    async fn remote_ahead_tracks_unseen_revisions() {
        let mut engine = connected_orchestrator();
        let file_id = file(&engine, "Notes");
        engine.record_local_edit(&file_id, "draft").unwrap();
        engine.sync_file(file_id.clone()).await;

        // freshly synced: revisions agree, nothing unseen
        assert!(!engine.remote_ahead(&file_id).await.unwrap());

        // another device overwrote the remote copy
        engine
            .remote
            .seed(&document_path(&file_id), "changed elsewhere", "rev-elsewhere");
        assert!(engine.remote_ahead(&file_id).await.unwrap());
    }

    #[test]
    fn meaningful_content_ignores_structural_placeholders() {
        assert!(!has_meaningful_content(""));
        assert!(!has_meaningful_content("   \n\t\n"));
        assert!(!has_meaningful_content("# \n\n## \n"));
        assert!(!has_meaningful_content("- \n* \n> \n1.\n12."));
        assert!(has_meaningful_content("# Heading"));
        assert!(has_meaningful_content("just a sentence"));
        assert!(has_meaningful_content("- a real list item"));
        assert!(has_meaningful_content("2026"));
    }
}
