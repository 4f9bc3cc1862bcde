use authz::Principal;
use std::sync::Arc;
use tracing::{debug, error};

use super::password;
use super::store::UserStore;
use crate::error::{Result, UserError};

/// Checks a submitted identity and secret against the stored hash.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Returns the matching principal, or [`UserError::InvalidCredentials`]
    /// for an unknown identity and a wrong secret alike.
    ///
    /// Store failures are passed through unchanged.
    pub async fn verify(&self, identity: &str, secret: &str) -> Result<Principal> {
        let user = self.store.find_by_identity(identity).await?;

        let Some(user) = user else {
            let secret = secret.to_string();
            let _ = tokio::task::spawn_blocking(move || password::verify_dummy(&secret)).await;
            debug!("Login attempt for unknown identity");
            return Err(UserError::InvalidCredentials);
        };

        let secret = secret.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || password::verify_password(&secret, &hash))
            .await
            .map_err(|e| {
                error!("Password verification task failed: {}", e);
                UserError::PasswordHash(e.to_string())
            })??;

        if !matches {
            debug!("Password mismatch for user {}", user.id);
            return Err(UserError::InvalidCredentials);
        }

        Ok(user.principal())
    }
}
