//! Remote blob store abstraction and the Dropbox implementation.

mod dropbox;

pub use dropbox::DropboxRemote;

use async_trait::async_trait;

use crate::error::Result;

/// A downloaded document body with its revision token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub content: String,
    pub revision: String,
}

/// Metadata for a remote file without its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Opaque version token used for optimistic-concurrency comparison
    pub revision: String,
    /// Server modification time (Unix ms)
    pub server_modified_at: i64,
}

/// Operations the engine needs from a third-party blob store.
///
/// `download` and `get_metadata` return `None` for a path that does not
/// exist — absence is an ordinary answer, not an error. `upload` always
/// overwrites.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn download(&self, access_token: &str, path: &str) -> Result<Option<RemoteDocument>>;

    /// Upload `content` to `path`, overwriting, and return the new revision.
    async fn upload(&self, access_token: &str, path: &str, content: &str) -> Result<String>;

    async fn delete(&self, access_token: &str, path: &str) -> Result<()>;

    async fn get_metadata(&self, access_token: &str, path: &str) -> Result<Option<RemoteMetadata>>;
}
