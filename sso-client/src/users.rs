//! Local user records.
//!
//! The provider is the only authenticator: users created through SSO never
//! get a usable local password.

use crate::error::{SsoError, SsoResult};
use crate::identity::ProviderIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Local password state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "hash")]
pub enum PasswordState {
    /// Password login is impossible
    Unusable,
    /// Password hash managed elsewhere
    Hashed(String),
}

impl PasswordState {
    /// Check if password login is possible at all.
    pub fn is_usable(&self) -> bool {
        matches!(self, PasswordState::Hashed(_))
    }
}

/// Local user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: Uuid,

    /// Unique username (matches the provider username)
    pub username: String,

    /// Email address
    pub email: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Provider-side user id, as of account creation
    pub external_id: Option<String>,

    /// Password state
    pub password: PasswordState,

    /// Created at
    pub created_at: DateTime<Utc>,

    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user that cannot log in with a password.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            email: None,
            name: None,
            external_id: None,
            password: PasswordState::Unusable,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    /// Copy profile fields from a provider identity.
    pub fn with_profile(mut self, identity: &ProviderIdentity) -> Self {
        self.email = identity.email.clone();
        self.name = identity.name.clone();
        self.external_id = identity.external_id.clone();
        self
    }

    /// Check if the user can log in with a local password.
    pub fn has_usable_password(&self) -> bool {
        self.password.is_usable()
    }
}

/// User store trait.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id.
    async fn get(&self, id: Uuid) -> SsoResult<Option<User>>;

    /// Look up a user by username.
    async fn get_by_username(&self, username: &str) -> SsoResult<Option<User>>;

    /// Return the user named `identity.username`, creating it from the
    /// identity if needed. The flag is `true` when the user was created.
    ///
    /// A created user is stored with [`PasswordState::Unusable`] in the same
    /// write that creates it.
    async fn get_or_create(&self, identity: &ProviderIdentity) -> SsoResult<(User, bool)>;

    /// Set `last_login` on an existing user, leaving every other field alone.
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> SsoResult<()>;
}

/// In-memory user store.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Check if the store holds no users.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Insert a user directly.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: Uuid) -> SsoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> SsoResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn get_or_create(&self, identity: &ProviderIdentity) -> SsoResult<(User, bool)> {
        // Single write lock so two logins for the same name cannot both create.
        let mut users = self.users.write().await;

        if let Some(user) = users.values().find(|u| u.username == identity.username) {
            return Ok((user.clone(), false));
        }

        let user = User::new(&identity.username).with_profile(identity);
        users.insert(user.id, user.clone());
        Ok((user, true))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> SsoResult<()> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.last_login = Some(at);
                Ok(())
            }
            None => Err(SsoError::Storage(format!("user {id} not found"))),
        }
    }
}
