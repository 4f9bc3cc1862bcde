//! Error types for the authorization system.
//!
//! # Security Note
//! External messages stay generic. The ids involved in a denied check are
//! carried on the error for logging only and are not part of `Display`.

use thiserror::Error;

use crate::types::UserId;

/// Errors that can occur during authorization checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// The principal is authenticated but does not own the addressed resource.
    #[error("Access denied")]
    Forbidden {
        principal_id: UserId,
        requested_user_id: UserId,
    },
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_generic() {
        let err = AuthzError::Forbidden {
            principal_id: 7,
            requested_user_id: 8,
        };
        assert_eq!(err.to_string(), "Access denied");
    }
}
