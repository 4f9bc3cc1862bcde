//! User lookup contract consumed by the credential verifier

use async_trait::async_trait;
use authz::UserId;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{NewUserRecord, StoredUser};
use crate::error::{Result, UserError};

/// Read/insert access to user records.
///
/// `find_by_identity` looks a user up by email, the unique login identity.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<StoredUser>>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<StoredUser>>;

    /// Inserts a user. Fails with [`UserError::DuplicateIdentity`] when the
    /// email or username is already taken.
    async fn create_user(&self, record: NewUserRecord) -> Result<StoredUser>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-local store, used in tests and when no database is configured.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<StoredUser>>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<StoredUser>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == identity).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<StoredUser>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, record: NewUserRecord) -> Result<StoredUser> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == record.email) {
            return Err(UserError::DuplicateIdentity(format!(
                "Email {}",
                record.email
            )));
        }
        if users.iter().any(|u| u.username == record.username) {
            return Err(UserError::DuplicateIdentity(format!(
                "Username {}",
                record.username
            )));
        }

        let user = StoredUser {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
        };
        users.push(user.clone());

        debug!("Stored user {} in memory", user.id);
        Ok(user)
    }
}
