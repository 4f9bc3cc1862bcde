use authz::Principal;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::debug;

/// Request-scoped identity attached by the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: Principal,
}

impl AuthContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthContext>() {
            Some(context) => Ok(context.clone()),
            None => {
                debug!("No authentication context on request to {}", parts.uri.path());
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}
