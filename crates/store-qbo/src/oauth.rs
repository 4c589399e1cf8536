//! # QuickBooks OAuth
//!
//! Signed-state authorization flow and access-token lifecycle.
//!
//! The `state` parameter on the consent redirect is self-contained:
//! `base64url(millis.nonce.signature)` where the signature is an
//! HMAC-SHA256 over `millis.nonce` under `QBO_STATE_SECRET`. No server-side
//! state table exists; verification checks shape, then freshness (30
//! minutes), then the signature in constant time, and reports which of the
//! three failed.
//!
//! Tokens are persisted as one whole record (both tokens, realm, expiry)
//! so a crash between writes can never strand a half-rotated pair. The
//! stored expiry already has a safety margin subtracted, and reads refresh
//! proactively when the remaining lifetime is inside a small headroom, so
//! an access token is never handed out moments before it dies.

use crate::client::transport_error;
use crate::config::{QboConfig, ACCOUNTING_SCOPE};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use store_core::{StateRejection, StoreError, StoreResult};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Freshness window for the signed state parameter
const STATE_MAX_AGE_MINUTES: i64 = 30;

/// Subtracted from `expires_in` when a token is stored, so the recorded
/// expiry is already conservative
const EXPIRY_SAFETY_SECONDS: i64 = 60;

/// A stored token must outlive this headroom to be handed out without a
/// refresh
const REFRESH_HEADROOM_SECONDS: i64 = 15;

// =============================================================================
// Signed state parameter
// =============================================================================

fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Mint a signed state token issued at `now`
pub fn generate_state(secret: &str, now: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    let payload = format!("{}.{}", now.timestamp_millis(), nonce);
    let signature = compute_hmac_sha256(secret, &payload);
    general_purpose::URL_SAFE_NO_PAD.encode(format!("{}.{}", payload, signature))
}

/// Verify a state token against `now`.
///
/// Checks run shape, then freshness, then signature, so a genuine state
/// that sat in a browser tab for an hour reports `Expired` rather than
/// the alarming `BadSignature`.
pub fn verify_state(secret: &str, state: &str, now: DateTime<Utc>) -> Result<(), StateRejection> {
    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(state.as_bytes())
        .map_err(|_| StateRejection::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StateRejection::Malformed)?;

    let mut parts = decoded.splitn(3, '.');
    let (Some(millis), Some(nonce), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StateRejection::Malformed);
    };
    if millis.is_empty() || nonce.is_empty() || signature.is_empty() {
        return Err(StateRejection::Malformed);
    }
    let issued_millis: i64 = millis.parse().map_err(|_| StateRejection::Malformed)?;

    let age_millis = (now.timestamp_millis() - issued_millis).abs();
    if age_millis > STATE_MAX_AGE_MINUTES * 60 * 1000 {
        return Err(StateRejection::Expired);
    }

    let expected = compute_hmac_sha256(secret, &format!("{}.{}", millis, nonce));
    if !constant_time_compare(signature, &expected) {
        return Err(StateRejection::BadSignature);
    }
    Ok(())
}

// =============================================================================
// Token persistence
// =============================================================================

/// One complete QuickBooks connection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,

    /// Company id from the OAuth callback; every API path embeds it
    pub realm_id: String,

    /// Conservative expiry (safety margin already subtracted)
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// Whether the access token is still usable given the refresh headroom
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(REFRESH_HEADROOM_SECONDS)
    }
}

/// Persistence seam for the token record. Saves replace the whole record
/// atomically; there is no partial update.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> StoreResult<Option<TokenState>>;
    async fn save(&self, state: &TokenState) -> StoreResult<()>;
}

/// Type alias for a shared token store (dynamic dispatch)
pub type BoxedTokenStore = Arc<dyn TokenStore>;

/// JSON file on disk; write goes through a temp file plus rename
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> StoreResult<Option<TokenState>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Store(format!(
                    "failed to read token store {}: {}",
                    self.path.display(),
                    err
                )))
            }
        };
        let state = serde_json::from_str(&raw).map_err(|err| {
            StoreError::Store(format!(
                "token store {} is corrupt: {}",
                self.path.display(),
                err
            ))
        })?;
        Ok(Some(state))
    }

    async fn save(&self, state: &TokenState) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|err| StoreError::Store(format!("failed to serialize tokens: {}", err)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    StoreError::Store(format!(
                        "failed to create token dir {}: {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await.map_err(|err| {
            StoreError::Store(format!("failed to write token store: {}", err))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            StoreError::Store(format!("failed to replace token store: {}", err))
        })?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryTokenStore {
    state: RwLock<Option<TokenState>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(state: TokenState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> StoreResult<Option<TokenState>> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &TokenState) -> StoreResult<()> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }
}

// =============================================================================
// Token manager
// =============================================================================

/// A consent URL plus the state embedded in it
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Owns the OAuth dance: consent URL, callback exchange, and keeping one
/// valid access token on hand.
pub struct TokenManager {
    config: QboConfig,
    store: BoxedTokenStore,
    client: Client,

    /// Serializes refreshes so concurrent callers cannot burn the same
    /// refresh token twice
    refresh_gate: Mutex<()>,
}

impl TokenManager {
    pub fn new(config: QboConfig, store: BoxedTokenStore) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            store,
            client,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Build the Intuit consent URL with a freshly signed state
    pub fn authorization_request(&self) -> StoreResult<AuthorizationRequest> {
        let state = generate_state(&self.config.state_secret, Utc::now());
        let url = reqwest::Url::parse_with_params(
            &self.config.auth_base_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", ACCOUNTING_SCOPE),
                ("state", state.as_str()),
            ],
        )
        .map_err(|err| StoreError::Internal(format!("bad authorization URL: {}", err)))?;

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Handle the OAuth redirect: verify the state, exchange the code,
    /// persist the connection.
    #[instrument(skip(self, code, state))]
    pub async fn handle_callback(
        &self,
        code: &str,
        realm_id: &str,
        state: &str,
    ) -> StoreResult<TokenState> {
        verify_state(&self.config.state_secret, state, Utc::now())
            .map_err(|reason| StoreError::StateRejected { reason })?;

        let realm_id = realm_id.trim();
        if realm_id.is_empty() {
            return Err(StoreError::validation("callback is missing realmId"));
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(StoreError::validation("callback is missing code"));
        }

        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;

        let state = self.persist(response, realm_id.to_string(), None).await?;
        info!(realm_id = %state.realm_id, "QuickBooks connected");
        Ok(state)
    }

    /// The stored connection, if any (drives the status endpoint)
    pub async fn connection(&self) -> StoreResult<Option<TokenState>> {
        self.store.load().await
    }

    /// Return a token usable for at least the refresh headroom, refreshing
    /// proactively when the stored one is about to lapse.
    pub async fn valid_token(&self) -> StoreResult<TokenState> {
        let current = self.require_connection().await?;
        if current.usable_at(Utc::now()) {
            return Ok(current);
        }
        self.refresh(current).await
    }

    /// Refresh unconditionally. The API client calls this after an
    /// authorized request comes back 401/403, then retries exactly once.
    pub async fn force_refresh(&self) -> StoreResult<TokenState> {
        let current = self.require_connection().await?;
        self.refresh(current).await
    }

    async fn require_connection(&self) -> StoreResult<TokenState> {
        self.store.load().await?.ok_or_else(|| {
            StoreError::not_configured("QuickBooks connection (visit /api/qbo/connect)")
        })
    }

    #[instrument(skip(self, current), fields(realm_id = %current.realm_id))]
    async fn refresh(&self, current: TokenState) -> StoreResult<TokenState> {
        let _gate = self.refresh_gate.lock().await;

        // a caller that queued on the gate may find the work already done
        if let Some(fresh) = self.store.load().await? {
            if fresh.access_token != current.access_token && fresh.usable_at(Utc::now()) {
                return Ok(fresh);
            }
        }

        debug!("Refreshing QuickBooks access token");
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &current.refresh_token),
            ])
            .await?;

        self.persist(response, current.realm_id.clone(), Some(current.refresh_token))
            .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> StoreResult<TokenResponse> {
        let response = self
            .client
            .post(&self.config.token_base_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_token_failure(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| {
            StoreError::Internal(format!("Failed to parse QuickBooks token response: {}", err))
        })
    }

    /// Persist one whole connection record. A refresh response without a
    /// rotated refresh token keeps the previous one.
    async fn persist(
        &self,
        response: TokenResponse,
        realm_id: String,
        previous_refresh: Option<String>,
    ) -> StoreResult<TokenState> {
        let refresh_token = response
            .refresh_token
            .or(previous_refresh)
            .ok_or_else(|| {
                StoreError::Internal("QuickBooks token response had no refresh token".to_string())
            })?;

        let lifetime = (response.expires_in - EXPIRY_SAFETY_SECONDS).max(0);
        let state = TokenState {
            access_token: response.access_token,
            refresh_token,
            realm_id,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        };
        self.store.save(&state).await?;
        Ok(state)
    }
}

fn classify_token_failure(status: reqwest::StatusCode, body: &str) -> StoreError {
    let parsed: Option<TokenErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error_description.clone().or_else(|| e.error.clone()))
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    // invalid_grant means a dead refresh token or revoked consent; both
    // are credential problems, not request problems
    let invalid_grant = parsed
        .as_ref()
        .and_then(|e| e.error.as_deref())
        .is_some_and(|e| e == "invalid_grant");

    if status == reqwest::StatusCode::UNAUTHORIZED || invalid_grant {
        StoreError::Authentication {
            provider: "quickbooks".to_string(),
            message,
        }
    } else {
        StoreError::ExternalBusiness {
            provider: "quickbooks".to_string(),
            status: status.as_u16(),
            code: parsed.and_then(|e| e.error),
            message,
        }
    }
}

// =============================================================================
// Intuit wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}
