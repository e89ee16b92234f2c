//! OAuth token lifecycle: PKCE authorization, code exchange, and proactive
//! refresh.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::util::{compact_text, unix_timestamp_now};

/// Refresh when this close to expiry, so a token never goes stale mid-sync.
const EXPIRY_SKEW_SECONDS: i64 = 60;

const STATE_BYTES: usize = 16;
const CODE_VERIFIER_BYTES: usize = 32;

/// A granted token set, persisted wholesale and replaced wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds, as delivered by the token endpoint)
    pub expires_at: i64,
    pub account_id: Option<String>,
}

impl TokenState {
    /// Whether the access token is expired or within the refresh window.
    #[must_use]
    pub fn is_expiring(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenState")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// An authorization in progress: the values that must survive between
/// building the authorize URL and handling the callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// URL to send the user to
    pub authorize_url: String,
    /// Anti-CSRF state the callback must echo
    pub state: String,
    /// PKCE code verifier matching the challenge sent in the URL
    pub code_verifier: String,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingAuthorization")
            .field("authorize_url", &self.authorize_url)
            .field("state", &self.state)
            .field("code_verifier", &"[REDACTED]")
            .finish()
    }
}

/// OAuth client speaking form-encoded POST to the token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Start an authorization: generate state and PKCE verifier, and build
    /// the URL the user must visit. Offline access is always requested.
    #[must_use]
    pub fn begin_authorization(&self) -> PendingAuthorization {
        let state = random_url_safe(STATE_BYTES);
        let code_verifier = random_url_safe(CODE_VERIFIER_BYTES);
        let challenge = code_challenge(&code_verifier);

        let authorize_url = format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256&token_access_type=offline&scope={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&state),
            urlencoding::encode(&challenge),
            urlencoding::encode(&self.config.scopes),
        );

        PendingAuthorization {
            authorize_url,
            state,
            code_verifier,
        }
    }

    /// Handle the authorization callback: validate the echoed state, then
    /// exchange the code plus verifier for a token set.
    ///
    /// A response without a refresh token is a hard failure — offline access
    /// was not actually granted and sync could never outlive the first
    /// access token.
    pub async fn complete_authorization(
        &self,
        pending: &PendingAuthorization,
        returned_state: &str,
        code: &str,
    ) -> Result<TokenState> {
        if returned_state != pending.state {
            return Err(Error::Auth(
                "Authorization state mismatch - possible CSRF, try connecting again".to_string(),
            ));
        }

        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Auth(
                "Authorization response did not include a code".to_string(),
            ));
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", pending.code_verifier.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let response = self.send_token_request(&form).await?;
        response.into_token_state(None)
    }

    /// Exchange the refresh token for a fresh access token, preserving the
    /// refresh token and account id unless the server returns new values.
    pub async fn refresh(&self, token: &TokenState) -> Result<TokenState> {
        if token.refresh_token.trim().is_empty() {
            return Err(Error::Auth("Refresh token must not be empty".to_string()));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        let response = self.send_token_request(&form).await?;
        response.into_token_state(Some(token))
    }

    /// Return a token guaranteed to outlive the refresh window, refreshing
    /// when the current one is within 60 s of expiry.
    pub async fn ensure_fresh(&self, token: TokenState) -> Result<TokenState> {
        if token.is_expiring() {
            self.refresh(&token).await
        } else {
            Ok(token)
        }
    }

    async fn send_token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(parse_api_error(status, &body)));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

/// Extract `code` and `state` from a redirect URL or bare query string.
pub fn parse_redirect(raw: &str) -> Result<(String, String)> {
    let raw = raw.trim();
    let query = raw.split_once('?').map_or(raw, |(_, query)| query);
    let query = query.split_once('#').map_or(query, |(query, _)| query);

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map_err(|error| Error::InvalidInput(format!("Malformed redirect URL: {error}")))?
            .into_owned();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => Ok((code, state)),
        _ => Err(Error::InvalidInput(
            "Redirect URL did not include code and state".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    account_id: Option<String>,
}

impl TokenResponse {
    fn into_token_state(self, existing: Option<&TokenState>) -> Result<TokenState> {
        let access_token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::Auth("Token response did not include an access token".to_string())
            })?;

        let expires_at = self
            .expires_at
            .or_else(|| {
                self.expires_in
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            })
            .ok_or_else(|| {
                Error::Auth("Token response did not include an expiry".to_string())
            })?;

        let refresh_token = self
            .refresh_token
            .filter(|token| !token.trim().is_empty())
            .or_else(|| existing.map(|token| token.refresh_token.clone()))
            .ok_or_else(|| {
                Error::Auth(
                    "Authorization did not grant offline access (no refresh token)".to_string(),
                )
            })?;

        let account_id = self
            .account_id
            .or_else(|| existing.and_then(|token| token.account_id.clone()));

        Ok(TokenState {
            access_token,
            refresh_token,
            expires_at,
            account_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_api_error(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorBody>(body) {
        if let Some(message) = payload.error_description.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn random_url_safe(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// S256: BASE64URL(SHA256(verifier)), per RFC 7636.
fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
