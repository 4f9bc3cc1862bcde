pub mod auth;
pub mod database;
pub mod error;

use std::sync::Arc;
use tracing::{info, warn};

use auth::{
    AuthConfig, CredentialVerifier, Credentials, InMemoryUserStore, StoredUser, TokenCodec,
    TokenIssuer, TokenPair, UserRegistration, UserStore,
};
use authz::Principal;
use database::UserDatabase;

/// Entry point to user records and the token machinery built on them
pub struct UserManager {
    store: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    issuer: TokenIssuer,
    config: AuthConfig,
}

impl UserManager {
    /// Create a user manager over an existing store
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        let codec = Arc::new(TokenCodec::new(config.secret()));
        let issuer = TokenIssuer::new(codec, config.access_ttl(), config.refresh_ttl());
        let verifier = CredentialVerifier::new(store.clone());

        Self {
            store,
            verifier,
            issuer,
            config,
        }
    }

    /// Open the SQLite database and build a manager over it
    pub async fn open(
        db_config: database::UserDatabaseConfig,
        config: AuthConfig,
    ) -> error::Result<Self> {
        info!("Initializing user management system");
        let database = UserDatabase::new(db_config).await?;
        Ok(Self::new(Arc::new(database), config))
    }

    /// Manager backed by a process-local store
    pub fn in_memory(config: AuthConfig) -> Self {
        Self::new(Arc::new(InMemoryUserStore::new()), config)
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verify credentials and issue a fresh token pair
    pub async fn login(&self, credentials: &Credentials) -> error::Result<(Principal, TokenPair)> {
        let principal = self
            .verifier
            .verify(&credentials.identity, &credentials.secret)
            .await?;
        let pair = self.issuer.issue_pair(&principal)?;

        info!("User {} logged in", principal);
        Ok((principal, pair))
    }

    /// Validate, hash and store a new user
    pub async fn register(&self, registration: UserRegistration) -> error::Result<StoredUser> {
        let email = registration.email.trim().to_string();
        let username = registration.username.trim().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(UserError::Validation("A valid email is required".to_string()));
        }
        if username.is_empty() {
            return Err(UserError::Validation("Username is required".to_string()));
        }
        if registration.password.is_empty() {
            return Err(UserError::Validation("Password is required".to_string()));
        }

        let password = registration.password;
        let password_hash =
            tokio::task::spawn_blocking(move || auth::password::hash_password(&password))
                .await
                .map_err(|e| UserError::PasswordHash(e.to_string()))??;

        let user = self
            .store
            .create_user(auth::NewUserRecord {
                email,
                username,
                password_hash,
            })
            .await
            .map_err(|e| {
                warn!("Signup rejected: {}", e);
                e
            })?;

        info!("Registered user {}", user.id);
        Ok(user)
    }
}

pub use database::UserDatabaseConfig;
pub use error::{Result as UserResult, UserError};

#[cfg(test)]
mod tests {
    use super::*;
    use auth::TokenKind;
    use tempfile::TempDir;

    fn config() -> AuthConfig {
        AuthConfig::new("manager-test-secret-0123456789abcdef", 900, 604_800).unwrap()
    }

    fn registration(email: &str, username: &str, password: &str) -> UserRegistration {
        UserRegistration {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let manager = UserManager::in_memory(config());
        let user = manager
            .register(registration(" alice@example.com ", "alice", "pw"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "pw");

        let (principal, pair) = manager
            .login(&Credentials::new("alice@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(principal, Principal::new(user.id, "alice"));

        let claims = manager
            .issuer()
            .codec()
            .verify_kind(&pair.access.value, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.principal(), principal);
    }

    #[tokio::test]
    async fn test_login_failure_is_invalid_credentials() {
        let manager = UserManager::in_memory(config());
        manager
            .register(registration("alice@example.com", "alice", "pw"))
            .await
            .unwrap();

        assert!(matches!(
            manager.login(&Credentials::new("alice@example.com", "bad")).await,
            Err(UserError::InvalidCredentials)
        ));
        assert!(matches!(
            manager.login(&Credentials::new("bob@example.com", "pw")).await,
            Err(UserError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_validation_and_duplicates() {
        let manager = UserManager::in_memory(config());

        assert!(matches!(
            manager.register(registration("not-an-email", "alice", "pw")).await,
            Err(UserError::Validation(_))
        ));
        assert!(matches!(
            manager.register(registration("a@example.com", " ", "pw")).await,
            Err(UserError::Validation(_))
        ));
        assert!(matches!(
            manager.register(registration("a@example.com", "alice", "")).await,
            Err(UserError::Validation(_))
        ));

        manager
            .register(registration("a@example.com", "alice", "pw"))
            .await
            .unwrap();
        assert!(matches!(
            manager.register(registration("a@example.com", "alice2", "pw")).await,
            Err(UserError::DuplicateIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_user_manager_over_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_config = UserDatabaseConfig {
            database_path: temp_dir.path().join("test_user.db"),
            ..UserDatabaseConfig::default()
        };

        let manager = UserManager::open(db_config, config()).await.unwrap();
        assert!(manager.store().ping().await.is_ok());

        let user = manager
            .register(registration("alice@example.com", "alice", "pw"))
            .await
            .unwrap();
        let (principal, _) = manager
            .login(&Credentials::new("alice@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(principal.id(), user.id);
    }
}
