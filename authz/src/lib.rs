//! Resource ownership checks for exptrack.
//!
//! Authorization runs after authentication:
//!
//! 1. **Request arrives** at the API layer
//! 2. **Authentication gate** verifies the cookies and attaches a [`Principal`]
//! 3. **Handler** addressing a user's resources calls [`verify_owner`]
//! 4. **Decision**: proceed, or fail with [`AuthzError::Forbidden`]
//!
//! The check is a pure comparison with no I/O, so it is cheap to run on
//! every user-scoped handler.

pub mod error;
pub mod types;

use tracing::warn;

pub use error::{AuthzError, Result};
pub use types::{Principal, UserId};

/// Fails with [`AuthzError::Forbidden`] unless `principal` owns `requested_user_id`.
pub fn verify_owner(principal: &Principal, requested_user_id: UserId) -> Result<()> {
    if principal.id() == requested_user_id {
        return Ok(());
    }

    warn!(
        "AUTHZ: principal {} denied access to resources of user {}",
        principal.id(),
        requested_user_id
    );
    Err(AuthzError::Forbidden {
        principal_id: principal.id(),
        requested_user_id,
    })
}

/// Ownership guard bound to an authenticated principal.
///
/// Handlers that address several user-scoped resources can build this once
/// from the request context and check each id against it.
///
/// # Example
///
/// ```rust
/// use authz::{OwnershipGuard, Principal};
///
/// let guard = OwnershipGuard::new(Principal::new(7, "alice"));
/// assert!(guard.check(7).is_ok());
/// assert!(guard.check(8).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct OwnershipGuard {
    principal: Principal,
}

impl OwnershipGuard {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn check(&self, requested_user_id: UserId) -> Result<()> {
        verify_owner(&self.principal, requested_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_owner_passes_silently() {
        let principal = Principal::new(7, "alice");
        assert_eq!(verify_owner(&principal, 7), Ok(()));
    }

    #[test]
    fn test_other_user_is_forbidden() {
        let principal = Principal::new(7, "alice");
        assert_eq!(
            verify_owner(&principal, 8),
            Err(AuthzError::Forbidden {
                principal_id: 7,
                requested_user_id: 8,
            })
        );
    }

    #[rstest]
    #[case(1, 2)]
    #[case(2, 1)]
    #[case(0, -1)]
    #[case(i64::MAX, i64::MIN)]
    fn test_mismatched_ids_never_pass(#[case] owner: UserId, #[case] requested: UserId) {
        let principal = Principal::new(owner, "someone");
        assert!(verify_owner(&principal, requested).is_err());
    }

    #[test]
    fn test_guard_checks_against_bound_principal() {
        let guard = OwnershipGuard::new(Principal::new(3, "dana"));
        assert_eq!(guard.principal().id(), 3);
        assert!(guard.check(3).is_ok());
        assert!(matches!(
            guard.check(4),
            Err(AuthzError::Forbidden {
                principal_id: 3,
                requested_user_id: 4
            })
        ));
    }
}
