//! Token signing configuration

use chrono::Duration;
use rand::RngCore;
use std::env;
use std::fmt;
use tracing::warn;

use crate::error::{Result, UserError};

/// Minimum HMAC-SHA256 key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;
pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Signing key and token lifetimes, fixed at process start.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Result<Self> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(UserError::Configuration(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if access_ttl_seconds <= 0 || refresh_ttl_seconds <= 0 {
            return Err(UserError::Configuration(
                "Token lifetimes must be positive".to_string(),
            ));
        }
        if refresh_ttl_seconds <= access_ttl_seconds {
            return Err(UserError::Configuration(
                "Refresh token lifetime must exceed access token lifetime".to_string(),
            ));
        }

        Ok(Self {
            secret,
            access_ttl: Duration::seconds(access_ttl_seconds),
            refresh_ttl: Duration::seconds(refresh_ttl_seconds),
        })
    }

    /// Random key with default lifetimes. Tokens do not survive a restart.
    pub fn ephemeral() -> Self {
        Self {
            secret: random_secret(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECONDS),
        }
    }

    /// Loads configuration from the environment.
    ///
    /// `JWT_SECRET` is required when `ENVIRONMENT=prd`; in `dev` and `test` a
    /// random key is generated when it is missing.
    pub fn from_env() -> Result<Self> {
        let secret = Self::load_secret()?;
        let access = Self::ttl_from_env("JWT_ACCESS_TTL_SECONDS", DEFAULT_ACCESS_TTL_SECONDS)?;
        let refresh = Self::ttl_from_env("JWT_REFRESH_TTL_SECONDS", DEFAULT_REFRESH_TTL_SECONDS)?;
        Self::new(secret, access, refresh)
    }

    fn load_secret() -> Result<Vec<u8>> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => Ok(secret.into_bytes()),
            _ => match environment.as_str() {
                "prd" => Err(UserError::Configuration("JWT_SECRET not set".to_string())),
                _ => {
                    warn!(
                        "JWT_SECRET not set in '{}' environment. Using a random key; tokens will not survive a restart.",
                        environment
                    );
                    Ok(random_secret())
                }
            },
        }
    }

    fn ttl_from_env(key: &str, default: i64) -> Result<i64> {
        match env::var(key) {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| UserError::Configuration(format!("Invalid {}: {}", key, e))),
            Err(_) => Ok(default),
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_valid_config() {
        let config = AuthConfig::new(SECRET, 900, 604_800).unwrap();
        assert_eq!(config.access_ttl(), Duration::seconds(900));
        assert_eq!(config.refresh_ttl(), Duration::days(7));
        assert_eq!(config.secret(), SECRET.as_bytes());
        assert!(!format!("{:?}", config).contains(SECRET));
    }

    #[rstest]
    #[case("short", 900, 604_800)]
    #[case(SECRET, 0, 604_800)]
    #[case(SECRET, 900, -1)]
    #[case(SECRET, 900, 900)]
    #[case(SECRET, 3600, 60)]
    fn test_invalid_config(#[case] secret: &str, #[case] access: i64, #[case] refresh: i64) {
        assert!(matches!(
            AuthConfig::new(secret, access, refresh),
            Err(UserError::Configuration(_))
        ));
    }

    #[test]
    fn test_ephemeral_config_has_strong_key() {
        let a = AuthConfig::ephemeral();
        let b = AuthConfig::ephemeral();
        assert_eq!(a.secret().len(), 64);
        assert_ne!(a.secret(), b.secret());
        assert!(a.refresh_ttl() > a.access_ttl());
    }
}
