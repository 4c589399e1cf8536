//! # Storefront Error Types
//!
//! Typed error handling for the storefront order engine.
//! All fallible operations return `Result<T, StoreError>`.

use thiserror::Error;

/// Why an OAuth authorization state token was rejected.
///
/// The three kinds are deliberately distinct so callers can show an
/// actionable message: a stale redirect reads very differently from a
/// forged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRejection {
    /// Token did not decode into the expected `timestamp.nonce.signature` shape
    Malformed,
    /// Token decoded but its timestamp is outside the freshness window
    Expired,
    /// Token decoded and is fresh, but the signature does not verify
    BadSignature,
}

impl std::fmt::Display for StateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StateRejection::Malformed => "malformed",
            StateRejection::Expired => "expired",
            StateRejection::BadSignature => "bad signature",
        };
        write!(f, "{}", s)
    }
}

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad or missing required input; never retried
    #[error("validation error: {0}")]
    Validation(String),

    /// A required integration has no (or incomplete) credentials
    #[error("not configured: {setting}")]
    NotConfigured { setting: String },

    /// An external credential was rejected; triggers the candidate
    /// fallback in the payment broker or a single token refresh
    #[error("authentication rejected by {provider}: {message}")]
    Authentication { provider: String, message: String },

    /// Timeout or network failure reaching an external system
    #[error("{provider} unreachable: {message}")]
    Unreachable { provider: String, message: String },

    /// The external system understood the request but rejected it for
    /// domain reasons; carries the status and first structured error entry
    #[error("{provider} rejected the request (status {status}, code {}): {message}", .code.as_deref().unwrap_or("unknown"))]
    ExternalBusiness {
        provider: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Requested record does not exist
    #[error("{what} not found")]
    NotFound { what: String },

    /// OAuth authorization state token rejected
    #[error("authorization state rejected: {reason}")]
    StateRejected { reason: StateRejection },

    /// Persistence boundary failure
    #[error("store error: {0}")]
    Store(String),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Validation and configuration problems never clear on their own,
    /// and authentication errors are handled structurally (credential
    /// fallback or a single token refresh), so only transport failures
    /// qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unreachable { .. })
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Validation(_) => 400,
            StoreError::NotConfigured { .. } => 503,
            StoreError::Authentication { .. } => 502,
            StoreError::Unreachable { .. } => 504,
            StoreError::ExternalBusiness { .. } => 502,
            StoreError::NotFound { .. } => 404,
            StoreError::StateRejected { .. } => 400,
            StoreError::Store(_) => 500,
            StoreError::Internal(_) => 500,
        }
    }

    /// Convenience constructor for validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Convenience constructor naming a missing setting
    pub fn not_configured(setting: impl Into<String>) -> Self {
        StoreError::NotConfigured {
            setting: setting.into(),
        }
    }
}

/// Result type alias for storefront operations
pub type StoreResult<T> = Result<T, StoreError>;
