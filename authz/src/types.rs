//! Core authorization types.
//!
//! A [`Principal`] is the minimal verified identity attached to an
//! authenticated request. It is a projection: built from a stored user record
//! at login or from a verified token's claims, never persisted on its own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a user record.
pub type UserId = i64;

/// Represents the authenticated identity making a request.
///
/// # Security Note
/// Principals must only be derived from verified credentials or verified
/// token claims. Never build one from untrusted request data such as path
/// segments or query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The user record identifier
    id: UserId,

    /// Display name shown to the user (the `username` claim on the wire)
    #[serde(rename = "username")]
    display_name: String,
}

impl Principal {
    /// Creates a new Principal with the given id and display name.
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns true if both principals name the same subject (id and name).
    pub fn same_subject(&self, other: &Principal) -> bool {
        self.id == other.id && self.display_name == other.display_name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_creation() {
        let principal = Principal::new(42, "alice");
        assert_eq!(principal.id(), 42);
        assert_eq!(principal.display_name(), "alice");
    }

    #[test]
    fn test_principal_serializes_username_field() {
        let principal = Principal::new(7, "bob");
        let value = serde_json::to_value(&principal).unwrap();
        assert_eq!(value, serde_json::json!({ "id": 7, "username": "bob" }));
    }

    #[test]
    fn test_same_subject_requires_id_and_name() {
        let a = Principal::new(1, "alice");
        assert!(a.same_subject(&Principal::new(1, "alice")));
        assert!(!a.same_subject(&Principal::new(1, "mallory")));
        assert!(!a.same_subject(&Principal::new(2, "alice")));
    }

    #[test]
    fn test_display_hides_name() {
        assert_eq!(Principal::new(9, "carol").to_string(), "User(9)");
    }
}
