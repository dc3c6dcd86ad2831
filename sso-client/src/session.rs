//! Server-side sessions.
//!
//! A [`Session`] is the explicit, request-scoped session context handed to
//! every handshake operation. It is loaded from a [`SessionStore`] at the
//! start of a request and committed back at the end. The store is the only
//! thing shared between requests; it decides how concurrent writers to the
//! same session id interleave.

use crate::error::{SsoError, SsoResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Length of generated session ids.
const SESSION_ID_LEN: usize = 32;

/// Persisted form of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Arbitrary session values
    pub data: HashMap<String, serde_json::Value>,

    /// Authenticated local user, if any
    pub user_id: Option<Uuid>,

    /// Record is ignored after this instant
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Check if the record has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Session store trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live record. Expired records are reported as absent.
    async fn load(&self, id: &str) -> SsoResult<Option<SessionRecord>>;

    /// Insert or replace a record.
    async fn save(&self, id: &str, record: SessionRecord) -> SsoResult<()>;

    /// Delete a record. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> SsoResult<()>;

    /// Drop expired records, returning how many were removed.
    async fn cleanup_expired(&self) -> SsoResult<u64>;
}

/// In-memory session store.
///
/// Suitable for a single process and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> SsoResult<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).filter(|r| !r.is_expired()).cloned())
    }

    async fn save(&self, id: &str, record: SessionRecord) -> SsoResult<()> {
        self.records.write().await.insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> SsoResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> SsoResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired());
        let deleted = (before - records.len()) as u64;

        if deleted > 0 {
            tracing::debug!(deleted, "Cleaned up expired sessions");
        }

        Ok(deleted)
    }
}

/// What [`Session::commit`] did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommit {
    /// Nothing changed; the client keeps whatever cookie it has.
    Unchanged,
    /// Session saved under this id; the client must hold this cookie.
    Saved(String),
    /// Session is gone; the client cookie should be cleared.
    Cleared,
}

/// Request-scoped session context.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    retired_id: Option<String>,
    data: HashMap<String, serde_json::Value>,
    user_id: Option<Uuid>,
    modified: bool,
}

impl Session {
    /// Fresh anonymous session with no id yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the session for `id`, or start a fresh one if the id is
    /// missing, unknown, or expired.
    pub async fn load(store: &dyn SessionStore, id: Option<&str>) -> SsoResult<Self> {
        let Some(id) = id else {
            return Ok(Self::new());
        };

        Ok(match store.load(id).await? {
            Some(record) => Self {
                id: Some(id.to_string()),
                retired_id: None,
                data: record.data,
                user_id: record.user_id,
                modified: false,
            },
            None => Self::new(),
        })
    }

    /// Session id, if the session has been persisted.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether anything changed since load.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Read a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Store a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
        self.modified = true;
    }

    /// Remove and return a value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        let value = self.data.remove(key);
        if value.is_some() {
            self.modified = true;
        }
        value
    }

    /// Authenticated local user id.
    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Bind the session to `user_id`.
    ///
    /// Data is kept but the session id is rotated, so an id planted before
    /// login cannot be used afterwards.
    pub fn login(&mut self, user_id: Uuid) {
        self.rotate();
        self.user_id = Some(user_id);
        self.modified = true;
    }

    /// Drop all data, the user binding, and the id.
    pub fn flush(&mut self) {
        self.rotate();
        self.data.clear();
        self.user_id = None;
        self.modified = true;
    }

    fn rotate(&mut self) {
        if let Some(old) = self.id.take() {
            // Keep the first retired id; that is the one the store knows.
            self.retired_id.get_or_insert(old);
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty() && self.user_id.is_none()
    }

    /// Write changes back to `store`.
    pub async fn commit(
        &mut self,
        store: &dyn SessionStore,
        ttl: Duration,
    ) -> SsoResult<SessionCommit> {
        if let Some(old) = self.retired_id.take() {
            store.delete(&old).await?;
        }

        if !self.modified {
            return Ok(SessionCommit::Unchanged);
        }

        if self.is_empty() {
            if let Some(id) = self.id.take() {
                store.delete(&id).await?;
            }
            self.modified = false;
            return Ok(SessionCommit::Cleared);
        }

        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| SsoError::ConfigError(format!("session TTL {ttl} is out of range")))?;

        let id = self.id.get_or_insert_with(generate_session_id).clone();
        let record = SessionRecord {
            data: self.data.clone(),
            user_id: self.user_id,
            expires_at,
        };
        store.save(&id, record).await?;
        self.modified = false;

        Ok(SessionCommit::Saved(id))
    }
}

fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
