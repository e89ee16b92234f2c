//! Dropbox content API client.
//!
//! Speaks the small slice of the HTTP API the engine needs: download,
//! overwrite-upload, delete, and metadata. A 409 whose error summary names a
//! missing path is mapped to `None`; token problems surface as auth errors
//! so the orchestrator can clear the stored token.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{is_auth_failure_message, Error, Result};
use crate::util::{compact_text, is_http_url};

use super::{RemoteDocument, RemoteMetadata, RemoteStore};

const API_BASE_URL: &str = "https://api.dropboxapi.com";
const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com";

/// Dropbox-backed [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct DropboxRemote {
    api_base_url: String,
    content_base_url: String,
    client: reqwest::Client,
}

impl DropboxRemote {
    /// Client against the production Dropbox endpoints.
    pub fn new() -> Result<Self> {
        Self::with_base_urls(API_BASE_URL, CONTENT_BASE_URL)
    }

    /// Client against custom endpoints (used by tests and local stubs).
    pub fn with_base_urls(api_base_url: &str, content_base_url: &str) -> Result<Self> {
        let api_base_url = normalize_base_url(api_base_url)?;
        let content_base_url = normalize_base_url(content_base_url)?;
        Ok(Self {
            api_base_url,
            content_base_url,
            client: reqwest::Client::builder().build()?,
        })
    }
}

#[async_trait]
impl RemoteStore for DropboxRemote {
    async fn download(&self, access_token: &str, path: &str) -> Result<Option<RemoteDocument>> {
        let response = self
            .client
            .post(format!("{}/2/files/download", self.content_base_url))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", path_arg(path)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_missing_path(status, &body) {
                return Ok(None);
            }
            return Err(api_error("download", path, status, &body));
        }

        let info = parse_result_header(&response, path)?;
        let content = response.text().await?;
        Ok(Some(RemoteDocument {
            content,
            revision: info.rev,
        }))
    }

    async fn upload(&self, access_token: &str, path: &str, content: &str) -> Result<String> {
        let argument = serde_json::to_string(&serde_json::json!({
            "path": path,
            "mode": "overwrite",
            "mute": true,
        }))?;

        let response = self
            .client
            .post(format!("{}/2/files/upload", self.content_base_url))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", argument)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error("upload", path, status, &body));
        }

        let info = response.json::<FileInfo>().await?;
        Ok(info.rev)
    }

    async fn delete(&self, access_token: &str, path: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/2/files/delete_v2", self.api_base_url))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // deleting something already gone is fine
            if !is_missing_path(status, &body) {
                return Err(api_error("delete", path, status, &body));
            }
        }
        Ok(())
    }

    async fn get_metadata(&self, access_token: &str, path: &str) -> Result<Option<RemoteMetadata>> {
        let response = self
            .client
            .post(format!("{}/2/files/get_metadata", self.api_base_url))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_missing_path(status, &body) {
                return Ok(None);
            }
            return Err(api_error("get_metadata", path, status, &body));
        }

        let info = response.json::<FileInfo>().await?;
        Ok(Some(RemoteMetadata {
            revision: info.rev,
            server_modified_at: parse_server_modified(info.server_modified.as_deref()),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    rev: String,
    #[serde(default)]
    server_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: Option<String>,
}

fn path_arg(path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Remote path cannot be empty".to_string(),
        ));
    }
    Ok(serde_json::to_string(&serde_json::json!({ "path": path }))?)
}

/// Content endpoints return the file metadata in a response header next to
/// the raw body.
fn parse_result_header(response: &reqwest::Response, path: &str) -> Result<FileInfo> {
    let raw = response
        .headers()
        .get("Dropbox-API-Result")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            Error::Remote(format!(
                "Dropbox download for {path} returned no result header"
            ))
        })?;
    Ok(serde_json::from_str(raw)?)
}

fn is_missing_path(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT && body.contains("not_found")
}

fn api_error(operation: &str, path: &str, status: StatusCode, body: &str) -> Error {
    let summary = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error_summary)
        .map_or_else(|| compact_text(body), |summary| summary.trim().to_string());

    if status == StatusCode::UNAUTHORIZED || is_auth_failure_message(&summary) {
        let detail = if summary.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            summary
        };
        return Error::Auth(detail);
    }

    if summary.is_empty() {
        Error::Remote(format!(
            "Dropbox {operation} failed for {path}: HTTP {}",
            status.as_u16()
        ))
    } else {
        Error::Remote(format!(
            "Dropbox {operation} failed for {path}: {summary} ({})",
            status.as_u16()
        ))
    }
}

fn parse_server_modified(raw: Option<&str>) -> i64 {
    raw.and_then(|value| chrono::DateTime::parse_from_rfc3339(value).ok())
        .map_or(0, |parsed| parsed.timestamp_millis())
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !is_http_url(trimmed) {
        return Err(Error::InvalidInput(
            "Remote base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
