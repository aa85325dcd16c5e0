//! User - The Stored Record
//!
//! TigerStyle: Plain value type. The id is assigned by storage, never by callers.

use serde::{Deserialize, Serialize};

/// Identifier assigned to a user by the active backend.
pub type UserId = u32;

// =============================================================================
// User
// =============================================================================

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Backend-assigned identifier, immutable once issued
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact address (not checked for uniqueness)
    pub email: String,
    /// Age in years
    pub age: u8,
}

impl User {
    /// Combine an assigned id with caller-supplied fields.
    #[must_use]
    pub fn from_fields(id: UserId, fields: UserFields) -> Self {
        Self {
            id,
            name: fields.name,
            email: fields.email,
            age: fields.age,
        }
    }

    /// The caller-mutable part of this record.
    #[must_use]
    pub fn fields(&self) -> UserFields {
        UserFields {
            name: self.name.clone(),
            email: self.email.clone(),
            age: self.age,
        }
    }
}

// =============================================================================
// UserFields
// =============================================================================

/// Caller-supplied values for `add` and `update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFields {
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Age in years
    pub age: u8,
}

impl UserFields {
    /// Create fields from anything string-like.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: u8) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
        }
    }
}
