//! # TTL Session Store
//!
//! Short-lived bearer tokens for the thank-you page: checkout mints a
//! token tied to `order:<id>`, and the status/reconcile endpoints accept
//! it until the TTL runs out. The trait is the seam; the in-memory
//! implementation expires entries lazily, with creation sweeping the dead
//! ones so the map never grows past the live set.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Issues and resolves opaque session tokens
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint a token for `identity`, valid for `ttl`
    async fn create(&self, identity: &str, ttl: Duration) -> String;

    /// Resolve a token to its identity, or `None` if unknown or expired
    async fn validate(&self, token: &str) -> Option<String>;
}

/// Shared session store handle
pub type BoxedSessionStore = Arc<dyn SessionStore>;

/// What a token resolves to (e.g. `order:ORD-1756147200000-9F3A2C`)
struct SessionEntry {
    identity: String,
    expires_at: DateTime<Utc>,
}

/// In-memory session store with per-entry expiry
pub struct TtlSessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl TtlSessionStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for TtlSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for TtlSessionStore {
    async fn create(&self, identity: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let token = generate_token();

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            token.clone(),
            SessionEntry {
                identity: identity.to_string(),
                expires_at: now + ttl,
            },
        );
        token
    }

    async fn validate(&self, token: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(token)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.identity.clone())
    }
}

/// 64 hex chars of randomness; not guessable, not derived from the identity
fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_round_trip_within_the_ttl() {
        let store = TtlSessionStore::new();
        let token = store.create("order:ORD-1", Duration::hours(24)).await;

        assert_eq!(token.len(), 64);
        assert_eq!(store.validate(&token).await.as_deref(), Some("order:ORD-1"));
        assert!(store.validate("not-a-token").await.is_none());
    }

    #[tokio::test]
    async fn expired_tokens_validate_to_none() {
        let store = TtlSessionStore::new();
        let token = store.create("order:ORD-1", Duration::seconds(-1)).await;

        assert!(store.validate(&token).await.is_none());
    }

    #[tokio::test]
    async fn creation_sweeps_dead_entries() {
        let store = TtlSessionStore::new();
        let dead = store.create("order:ORD-1", Duration::seconds(-1)).await;
        let live = store.create("order:ORD-2", Duration::hours(1)).await;

        let entries = store.entries.read().await;
        assert!(!entries.contains_key(&dead));
        assert!(entries.contains_key(&live));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let store = TtlSessionStore::new();
        let a = store.create("order:ORD-1", Duration::hours(1)).await;
        let b = store.create("order:ORD-1", Duration::hours(1)).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn dispatches_through_the_trait_object() {
        let store: BoxedSessionStore = Arc::new(TtlSessionStore::new());
        let token = store.create("order:ORD-1", Duration::hours(1)).await;
        assert!(store.validate(&token).await.is_some());
    }
}
