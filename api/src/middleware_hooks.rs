use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use cookie::Cookie;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use user::{
    auth::{
        AuthContext, CookieTransport, TokenKind, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
    },
    UserManager,
};

use crate::{error::ApiError, AppState};

/// Path prefixes that bypass the authentication gate.
///
/// A prefix matches the path itself and anything below it on a segment
/// boundary, so `/auth` matches `/auth/login` but not `/authority`.
/// Exceptions are exact paths that stay gated even under a public prefix.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    prefixes: Vec<String>,
    exceptions: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(["/api/public", "/auth"], ["/auth/me", "/auth/logout"])
    }
}

impl PublicPaths {
    pub fn new<P, E>(prefixes: P, exceptions: E) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            exceptions: exceptions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        if self.exceptions.iter().any(|e| e == path) {
            return false;
        }

        self.prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Why the gate refused a request. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    NoTokens,
    InvalidTokens,
    RotationFailed,
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRejection::NoTokens => write!(f, "no token cookies"),
            GateRejection::InvalidTokens => write!(f, "no acceptable token"),
            GateRejection::RotationFailed => write!(f, "rotated token could not be read back"),
        }
    }
}

/// Outcome of authenticating one request.
#[derive(Debug)]
pub enum GateDecision {
    /// Public path or preflight, tokens not inspected.
    Public,
    /// Access token accepted.
    Authenticated(AuthContext),
    /// Refresh token accepted and rotated; the cookies go on the response.
    Rotated {
        context: AuthContext,
        cookies: Vec<Cookie<'static>>,
    },
    Rejected(GateRejection),
}

/// Decides what to do with a request from its method, path and cookies.
///
/// Access cookie first; failing that the refresh cookie is rotated into a
/// new pair. Every verification failure becomes a rejection.
pub fn evaluate_request(
    manager: &UserManager,
    public_paths: &PublicPaths,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> GateDecision {
    if method == Method::OPTIONS || public_paths.is_public(path) {
        return GateDecision::Public;
    }

    let codec = manager.issuer().codec();
    let access = CookieTransport::read(headers, ACCESS_COOKIE_NAME);
    let refresh = CookieTransport::read(headers, REFRESH_COOKIE_NAME);

    if access.is_none() && refresh.is_none() {
        return GateDecision::Rejected(GateRejection::NoTokens);
    }

    if let Some(token) = access.as_deref() {
        match codec.verify_kind(token, TokenKind::Access) {
            Ok(claims) => return GateDecision::Authenticated(AuthContext::new(claims.principal())),
            Err(e) => debug!("Access cookie rejected: {}", e),
        }
    }

    let Some(token) = refresh.as_deref() else {
        return GateDecision::Rejected(GateRejection::InvalidTokens);
    };

    let pair = match manager.issuer().rotate(token) {
        Ok(pair) => pair,
        Err(e) => {
            debug!("Refresh cookie rejected: {}", e);
            return GateDecision::Rejected(GateRejection::InvalidTokens);
        }
    };

    let principal = match codec.verify_kind(&pair.access.value, TokenKind::Access) {
        Ok(claims) => claims.principal(),
        Err(e) => {
            error!("Freshly rotated access token failed verification: {}", e);
            return GateDecision::Rejected(GateRejection::RotationFailed);
        }
    };

    let now = Utc::now();
    let cookies = vec![
        CookieTransport::build(
            ACCESS_COOKIE_NAME,
            &pair.access.value,
            pair.access.remaining_seconds(now),
        ),
        CookieTransport::build(
            REFRESH_COOKIE_NAME,
            &pair.refresh.value,
            pair.refresh.remaining_seconds(now),
        ),
    ];

    GateDecision::Rotated {
        context: AuthContext::new(principal),
        cookies,
    }
}

/// Authentication gate
///
/// Runs [`evaluate_request`], attaches the [`AuthContext`] to the request
/// extensions on success and answers 401 otherwise. On the rotation path the
/// new cookies are added to the handler's response, unless the handler set a
/// cookie of the same name itself.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let decision = evaluate_request(
        &state.user_manager,
        &state.config.public_paths,
        request.method(),
        request.uri().path(),
        request.headers(),
    );

    match decision {
        GateDecision::Public => next.run(request).await,
        GateDecision::Authenticated(context) => {
            debug!("AUTH MIDDLEWARE: {} authenticated", context.principal);
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        GateDecision::Rotated { context, cookies } => {
            info!("AUTH MIDDLEWARE: rotated tokens for {}", context.principal);
            request.extensions_mut().insert(context);

            let mut response = next.run(request).await;
            if let Err(e) = CookieTransport::merge(response.headers_mut(), &cookies) {
                error!("AUTH MIDDLEWARE: failed to attach rotated cookies: {}", e);
            }
            response
        }
        GateDecision::Rejected(reason) => {
            warn!(
                "AUTH MIDDLEWARE: rejected {} {}: {}",
                request.method(),
                request.uri().path(),
                reason
            );
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Request processing middleware hook
/// This runs after authentication to modify/process incoming requests
pub async fn request_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    debug!("REQUEST MIDDLEWARE: Processing incoming {} request to {}", method, path);

    let response = next.run(request).await;

    debug!(
        "REQUEST MIDDLEWARE: {} {} -> {} in {:?}",
        method,
        path,
        response.status(),
        start.elapsed()
    );

    response
}

/// Response processing middleware hook
/// This runs before sending the response to modify/process outgoing responses
pub async fn response_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-Exptrack-Version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    if headers.contains_key(axum::http::header::SET_COOKIE) {
        headers.insert(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );
    }

    response
}
