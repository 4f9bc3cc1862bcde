//! Authentication core
//!
//! This module provides:
//! - Signed access/refresh tokens ([`token::TokenCodec`], [`issuer::TokenIssuer`])
//! - Cookie transport for those tokens ([`cookie::CookieTransport`])
//! - Credential verification against argon2 hashes
//! - The user lookup contract ([`store::UserStore`])
//! - The request-scoped [`context::AuthContext`] extractor

pub mod config;
pub mod context;
pub mod cookie;
pub mod credentials;
pub mod issuer;
pub mod password;
pub mod store;
pub mod token;
pub mod types;

pub use config::AuthConfig;
pub use context::AuthContext;
pub use cookie::{CookieTransport, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
pub use credentials::CredentialVerifier;
pub use issuer::TokenIssuer;
pub use store::{InMemoryUserStore, UserStore};
pub use token::{Claims, TokenCodec, TokenError};
pub use types::{
    Credentials, IssuedToken, NewUserRecord, StoredUser, TokenKind, TokenPair, UserRegistration,
};
