//! Signed, self-contained tokens (HS256 JWT).
//!
//! The codec holds the signing key fixed at process start and nothing else.
//! It keeps no record of issued tokens: verification is local, and expiry is
//! the only way a token stops being accepted.
//!
//! Signature verification and the expiry check are deliberately separate so
//! callers can tell a tampered token from one that simply ran out of time.

use authz::{Principal, UserId};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{IssuedToken, TokenKind};

/// Failure modes of token verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("expected {expected} token, found {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("token lifetime must be at least one second, got {0}s")]
    InvalidLifetime(i64),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    /// Subject: the display name.
    pub sub: String,
    pub username: String,
    #[serde(rename = "tokenType")]
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token so two pairs issued within the same second differ.
    pub jti: String,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.username.clone())
    }

    /// A token is live only while `now < exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }
}

/// Encodes and verifies tokens with a symmetric key.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked separately, see `verify_kind_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issues a token for `principal` valid for `ttl` from now.
    pub fn issue(&self, principal: &Principal, kind: TokenKind, ttl: Duration) -> Result<String> {
        self.issue_token(principal, kind, ttl).map(|token| token.value)
    }

    pub fn issue_token(
        &self,
        principal: &Principal,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        self.issue_token_at(principal, kind, Utc::now(), ttl)
    }

    /// Issues a token as if at `issued_at`.
    pub fn issue_token_at(
        &self,
        principal: &Principal,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let lifetime = ttl.num_seconds();
        if lifetime <= 0 {
            return Err(TokenError::InvalidLifetime(lifetime));
        }

        let iat = issued_at.timestamp();
        let exp = iat
            .checked_add(lifetime)
            .ok_or(TokenError::InvalidLifetime(lifetime))?;
        let expires_at =
            DateTime::from_timestamp(exp, 0).ok_or(TokenError::InvalidLifetime(lifetime))?;

        let claims = Claims {
            id: principal.id(),
            sub: principal.display_name().to_string(),
            username: principal.display_name().to_string(),
            token_type: kind,
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            value,
            kind,
            expires_at,
        })
    }

    /// Checks structure and signature. Does not look at expiry or kind.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        if data.claims.exp <= data.claims.iat {
            return Err(TokenError::Malformed);
        }
        Ok(data.claims)
    }

    /// Kind tag of a token whose signature verifies.
    pub fn kind_of(&self, token: &str) -> Result<TokenKind> {
        self.verify(token).map(|claims| claims.token_type)
    }

    /// Tokens that fail verification are reported as expired, so a caller
    /// can never mistake them for live ones.
    pub fn is_expired(&self, token: &str) -> bool {
        self.is_expired_at(token, Utc::now())
    }

    pub fn is_expired_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.verify(token)
            .map(|claims| claims.is_expired_at(now))
            .unwrap_or(true)
    }

    /// Full acceptance check: signature, kind, then expiry.
    pub fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        self.verify_kind_at(token, expected, Utc::now())
    }

    pub fn verify_kind_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.token_type,
            });
        }
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Seconds until the token expires (zero once expired).
    pub fn remaining_lifetime(&self, token: &str) -> Result<i64> {
        self.verify(token)
            .map(|claims| claims.remaining_seconds_at(Utc::now()))
    }

    /// True when the token is still live but expires within `threshold`.
    pub fn should_refresh(&self, token: &str, threshold: Duration) -> bool {
        match self.remaining_lifetime(token) {
            Ok(remaining) => remaining > 0 && remaining < threshold.num_seconds(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rstest::rstest;

    const SECRET: &[u8] = b"an-hmac-test-secret-of-at-least-32-bytes!";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET)
    }

    fn alice() -> Principal {
        Principal::new(7, "alice")
    }

    #[rstest]
    #[case(TokenKind::Access, 1)]
    #[case(TokenKind::Refresh, 604_800)]
    fn test_verify_returns_issued_claims(#[case] kind: TokenKind, #[case] ttl_secs: i64) {
        let codec = codec();
        let token = codec
            .issue(&alice(), kind, Duration::seconds(ttl_secs))
            .unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.principal(), alice());
        assert_eq!(claims.token_type, kind);
        assert_eq!(claims.exp - claims.iat, ttl_secs);
        assert_eq!(codec.kind_of(&token).unwrap(), kind);
    }

    #[test]
    fn test_wire_format_has_three_segments_and_named_claims() {
        let token = codec()
            .issue(&alice(), TokenKind::Access, Duration::minutes(15))
            .unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        let payload = URL_SAFE_NO_PAD.decode(segments[1]).unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(claims["id"], 7);
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["username"], "alice");
        assert_eq!(claims["tokenType"], "ACCESS");
        assert!(claims["iat"].is_i64());
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        let codec = codec();
        assert_eq!(
            codec.issue(&alice(), TokenKind::Access, Duration::zero()),
            Err(TokenError::InvalidLifetime(0))
        );
        assert_eq!(
            codec.issue(&alice(), TokenKind::Access, Duration::milliseconds(500)),
            Err(TokenError::InvalidLifetime(0))
        );
        assert!(codec
            .issue(&alice(), TokenKind::Access, Duration::seconds(-5))
            .is_err());
    }

    #[test]
    fn test_tampered_claims_fail_signature_check() {
        let codec = codec();
        let token = codec
            .issue(&alice(), TokenKind::Access, Duration::minutes(15))
            .unwrap();
        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();

        let mut claims: Vec<char> = segments[1].chars().collect();
        claims[5] = if claims[5] == 'A' { 'B' } else { 'A' };
        segments[1] = claims.into_iter().collect();
        let tampered = segments.join(".");

        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
        assert!(codec.is_expired(&tampered));
    }

    #[test]
    fn test_foreign_key_fails_signature_check() {
        let other = TokenCodec::new(b"a-completely-different-32-byte-secret!!");
        let token = other
            .issue(&alice(), TokenKind::Access, Duration::minutes(15))
            .unwrap();
        assert_eq!(codec().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[rstest]
    #[case("")]
    #[case("not-a-token")]
    #[case("a.b.c")]
    fn test_garbage_is_malformed(#[case] input: &str) {
        assert_eq!(codec().verify(input), Err(TokenError::Malformed));
        assert_eq!(codec().kind_of(input), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expiry_is_separate_from_signature() {
        let codec = codec();
        let issued_at = Utc::now() - Duration::hours(2);
        let token = codec
            .issue_token_at(&alice(), TokenKind::Access, issued_at, Duration::hours(1))
            .unwrap();

        // Signature is still fine, the token is just old.
        assert!(codec.verify(&token.value).is_ok());
        assert!(codec.is_expired(&token.value));
        assert_eq!(
            codec.verify_kind(&token.value, TokenKind::Access),
            Err(TokenError::Expired)
        );
        assert_eq!(codec.remaining_lifetime(&token.value), Ok(0));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec
            .issue_token_at(&alice(), TokenKind::Access, issued_at, Duration::seconds(60))
            .unwrap();

        assert!(!codec.is_expired_at(&token.value, token.expires_at - Duration::seconds(1)));
        assert!(codec.is_expired_at(&token.value, token.expires_at));
    }

    #[rstest]
    #[case(TokenKind::Access, TokenKind::Refresh)]
    #[case(TokenKind::Refresh, TokenKind::Access)]
    fn test_cross_kind_rejected(#[case] issued: TokenKind, #[case] required: TokenKind) {
        let codec = codec();
        let token = codec.issue(&alice(), issued, Duration::hours(1)).unwrap();
        assert_eq!(
            codec.verify_kind(&token, required),
            Err(TokenError::WrongKind {
                expected: required,
                found: issued,
            })
        );
        assert!(codec.verify_kind(&token, issued).is_ok());
    }

    #[test]
    fn test_should_refresh_only_close_to_expiry() {
        let codec = codec();
        let threshold = Duration::minutes(5);

        let fresh = codec
            .issue(&alice(), TokenKind::Access, Duration::minutes(15))
            .unwrap();
        assert!(!codec.should_refresh(&fresh, threshold));

        let closing = codec
            .issue(&alice(), TokenKind::Access, Duration::minutes(2))
            .unwrap();
        assert!(codec.should_refresh(&closing, threshold));

        let expired = codec
            .issue_token_at(
                &alice(),
                TokenKind::Access,
                Utc::now() - Duration::hours(1),
                Duration::minutes(1),
            )
            .unwrap();
        assert!(!codec.should_refresh(&expired.value, threshold));
    }

    fn signed_claims(iat: i64, exp: i64) -> String {
        let claims = Claims {
            id: 7,
            sub: "alice".into(),
            username: "alice".into(),
            token_type: TokenKind::Access,
            iat,
            exp,
            jti: "fixed".into(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[rstest]
    #[case(0)]
    #[case(-10)]
    fn test_expiry_not_after_issue_is_malformed(#[case] offset: i64) {
        let codec = codec();
        let now = Utc::now().timestamp();
        let token = signed_claims(now, now + offset);

        assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
        assert_eq!(
            codec.verify_kind(&token, TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_unsigned_token_is_malformed() {
        let now = Utc::now().timestamp();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "id": 7,
                "sub": "alice",
                "username": "alice",
                "tokenType": "ACCESS",
                "iat": now,
                "exp": now + 900,
                "jti": "x",
            })
            .to_string(),
        );
        let token = format!("{}.{}.", header, payload);

        assert_eq!(codec().verify(&token), Err(TokenError::Malformed));
        assert!(codec().is_expired(&token));
    }

    #[test]
    fn test_tokens_issued_together_differ() {
        let codec = codec();
        let a = codec.issue(&alice(), TokenKind::Access, Duration::hours(1)).unwrap();
        let b = codec.issue(&alice(), TokenKind::Access, Duration::hours(1)).unwrap();
        assert_ne!(a, b);
    }
}
