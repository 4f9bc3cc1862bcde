//! Issues and rotates access/refresh token pairs.

use authz::Principal;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use super::token::TokenCodec;
use super::types::{IssuedToken, TokenKind, TokenPair};
use crate::error::{Result, UserError};

/// Produces token pairs with independent lifetimes for each kind.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            codec,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair> {
        let access = self.issue_access(principal)?;
        let refresh = self
            .codec
            .issue_token(principal, TokenKind::Refresh, self.refresh_ttl)?;

        debug!("Issued token pair for {}", principal);
        Ok(TokenPair { access, refresh })
    }

    /// Replaces a still-valid refresh token with a brand-new pair.
    ///
    /// The principal comes from the refresh token's own claims; there is no
    /// store lookup. Every failure collapses to [`UserError::InvalidRefreshToken`].
    pub fn rotate(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self
            .codec
            .verify_kind(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                debug!("Refresh token rejected during rotation: {}", e);
                UserError::InvalidRefreshToken
            })?;

        self.issue_pair(&claims.principal()).map_err(|e| {
            warn!("Failed to issue rotated token pair: {}", e);
            UserError::InvalidRefreshToken
        })
    }

    /// True when `refresh_token` may renew `access_token`.
    ///
    /// The refresh token must be a live REFRESH token. The access token may
    /// be expired but its signature must verify, and both must name the same
    /// subject (id and name).
    pub fn can_refresh(&self, access_token: &str, refresh_token: &str) -> bool {
        let Ok(refresh) = self.codec.verify_kind(refresh_token, TokenKind::Refresh) else {
            return false;
        };
        let Ok(access) = self.codec.verify(access_token) else {
            return false;
        };

        access.principal().same_subject(&refresh.principal())
    }

    /// Issues a new access token only, keeping the caller's refresh token.
    pub fn refresh_access(&self, access_token: &str, refresh_token: &str) -> Result<IssuedToken> {
        if !self.can_refresh(access_token, refresh_token) {
            return Err(UserError::RefreshPairMismatch);
        }

        let claims = self
            .codec
            .verify_kind(refresh_token, TokenKind::Refresh)
            .map_err(|_| UserError::RefreshPairMismatch)?;
        self.issue_access(&claims.principal())
    }

    fn issue_access(&self, principal: &Principal) -> Result<IssuedToken> {
        Ok(self
            .codec
            .issue_token(principal, TokenKind::Access, self.access_ttl)?)
    }
}
