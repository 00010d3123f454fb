//! Token lookup and authorization-header resolution.
//!
//! A token lives in a pluggable [`TokenStore`]. The resolver probes the
//! configured stores in order and turns the first token it finds into a
//! single authorization header entry. A missing token is not an error:
//! the request proceeds unauthenticated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use tokio::sync::RwLock;

/// Pluggable storage backend for the auth token.
///
/// The contract mirrors a key-value store: synchronous backends simply
/// return immediately from the async methods. The client holds at most a
/// reference to a store, never its lifecycle.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Reads a value; `None` when the key is absent.
    async fn get_item(&self, key: &str) -> Option<String>;

    /// Writes a value.
    async fn set_item(&self, key: &str, value: &str);

    /// Removes a value; removing an absent key is a no-op.
    async fn remove_item(&self, key: &str);
}

/// In-memory [`TokenStore`] backed by an `RwLock`ed map.
///
/// The default store, and the one tests reach for.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().await.get(key).cloned()
    }

    async fn set_item(&self, key: &str, value: &str) {
        self.items.write().await.insert(key.to_string(), value.to_string());
    }

    async fn remove_item(&self, key: &str) {
        self.items.write().await.remove(key);
    }
}

/// Authentication configuration: which key to read, how to emit the header,
/// and which stores to probe (in order).
#[derive(Clone)]
pub struct AuthConfig {
    /// Storage key holding the token.
    pub token_key: String,
    /// Header name the token is written under.
    pub header_key: String,
    /// Prefix prepended to the token ("Bearer" by default; empty for none).
    pub header_type: String,
    /// Candidate stores, probed in order; first non-null token wins.
    pub stores: Vec<Arc<dyn TokenStore>>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_key", &self.token_key)
            .field("header_key", &self.header_key)
            .field("header_type", &self.header_type)
            .field("stores", &self.stores.len())
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_key: "token".to_string(),
            header_key: "Authorization".to_string(),
            header_type: "Bearer".to_string(),
            stores: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Probes the configured stores in order and builds the header entry.
    ///
    /// Returns `None` when no store yields a token, when no store is
    /// configured, or when the token does not form a valid header value -
    /// in every case the request proceeds unauthenticated rather than
    /// failing. This store read is the one point where the pipeline may
    /// suspend before dispatch.
    pub(crate) async fn resolve_header(&self) -> Option<(HeaderName, HeaderValue)> {
        let mut token = None;
        for store in &self.stores {
            if let Some(found) = store.get_item(&self.token_key).await {
                token = Some(found);
                break;
            }
        }
        let token = token?;

        let name = match HeaderName::try_from(self.header_key.as_str()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %self.header_key, "invalid auth header name, skipping auth");
                return None;
            }
        };
        let raw = format!("{} {}", self.header_type, token);
        match HeaderValue::try_from(raw.trim()) {
            Ok(value) => Some((name, value)),
            Err(_) => {
                tracing::warn!("auth token is not a valid header value, skipping auth");
                None
            }
        }
    }
}
