//! Authentication types

use authz::{Principal, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Token kind tag carried in the signed claims (`tokenType` on the wire).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "ACCESS"),
            TokenKind::Refresh => write!(f, "REFRESH"),
        }
    }
}

/// Identity and secret submitted at login. Input only.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// User record as returned by a [`UserStore`](crate::auth::store::UserStore).
#[derive(Clone, FromRow)]
pub struct StoredUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl StoredUser {
    /// Projects the record onto the minimal identity used by the auth core.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone())
    }
}

impl fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Signup data before hashing.
#[derive(Clone, Deserialize)]
pub struct UserRegistration {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Signup data after hashing, ready for the store.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// A signed token together with its expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Whole seconds until expiry, clamped at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Access and refresh tokens issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_wire_format() {
        assert_eq!(
            serde_json::to_value(TokenKind::Access).unwrap(),
            serde_json::json!("ACCESS")
        );
        assert_eq!(
            serde_json::from_value::<TokenKind>(serde_json::json!("REFRESH")).unwrap(),
            TokenKind::Refresh
        );
        assert_eq!(TokenKind::Refresh.to_string(), "REFRESH");
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let creds = Credentials::new("a@example.com", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("a@example.com"));
        assert!(!rendered.contains("hunter2"));

        let user = StoredUser {
            id: 1,
            username: "alice".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret-hash".to_string(),
        };
        assert!(!format!("{:?}", user).contains("secret-hash"));
        assert_eq!(user.principal(), Principal::new(1, "alice"));
    }

    #[test]
    fn test_remaining_seconds_clamps_at_zero() {
        let now = Utc::now();
        let token = IssuedToken {
            value: String::new(),
            kind: TokenKind::Access,
            expires_at: now - chrono::Duration::seconds(10),
        };
        assert_eq!(token.remaining_seconds(now), 0);

        let token = IssuedToken {
            expires_at: now + chrono::Duration::seconds(90),
            ..token
        };
        assert_eq!(token.remaining_seconds(now), 90);
    }
}
