//! Engine configuration.
//!
//! Covers the two externally-visible shapes the engine needs at
//! construction: the OAuth endpoints/app identity and the remote path
//! layout. Values are validated and normalized up front so the rest of the
//! engine can treat them as well-formed.

use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CLOCK_SKEW_TOLERANCE_MS;
use crate::error::{Error, Result};
use crate::models::FileId;
use crate::util::{is_http_url, normalize_text_option};

const DROPBOX_AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";
const DROPBOX_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
const DROPBOX_SCOPES: &str = "files.content.read files.content.write account_info.read";

/// OAuth application identity and endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Space-separated scope list requested at authorization
    pub scopes: String,
}

impl OAuthConfig {
    /// Configuration against the production Dropbox OAuth endpoints.
    pub fn dropbox(client_id: &str, redirect_uri: &str) -> Result<Self> {
        Self::with_endpoints(
            client_id,
            redirect_uri,
            DROPBOX_AUTHORIZE_URL,
            DROPBOX_TOKEN_URL,
            DROPBOX_SCOPES,
        )
    }

    /// Fully custom endpoints (used by tests and local stubs).
    pub fn with_endpoints(
        client_id: &str,
        redirect_uri: &str,
        authorize_url: &str,
        token_url: &str,
        scopes: &str,
    ) -> Result<Self> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(Error::InvalidInput(
                "OAuth client id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client_id: client_id.to_string(),
            redirect_uri: required_http_url(redirect_uri, "redirect_uri")?,
            authorize_url: required_http_url(authorize_url, "authorize_url")?,
            token_url: required_http_url(token_url, "token_url")?,
            scopes: scopes.trim().to_string(),
        })
    }
}

/// Where documents and the catalog live inside the remote store.
///
/// Per-document path is `<document_prefix><file_id><document_suffix>`; the
/// catalog manifest lives at one fixed well-known path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLayout {
    pub document_prefix: String,
    pub document_suffix: String,
    pub catalog_path: String,
}

impl RemoteLayout {
    /// Remote path for one document body.
    #[must_use]
    pub fn document_path(&self, file_id: &FileId) -> String {
        format!("{}{}{}", self.document_prefix, file_id, self.document_suffix)
    }
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            document_prefix: "/documents/".to_string(),
            document_suffix: ".md".to_string(),
            catalog_path: "/workspace.json".to_string(),
        }
    }
}

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub layout: RemoteLayout,
    /// Clock-skew slack used by the remote-ahead detector
    pub clock_skew_tolerance_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: RemoteLayout::default(),
            clock_skew_tolerance_ms: DEFAULT_CLOCK_SKEW_TOLERANCE_MS,
        }
    }
}

fn required_http_url(raw: &str, field: &'static str) -> Result<String> {
    let value = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{field} must not be empty")))?;
    if !is_http_url(&value) {
        return Err(Error::InvalidInput(format!(
            "{field} must include http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}
