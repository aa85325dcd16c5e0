//! Wire messages for the `user.User` service.
//!
//! Field names and widths follow the RPC schema: ages travel as `u32` and
//! are narrowed (with validation) before reaching storage.

use serde::{Deserialize, Serialize};
use userstore_core::User;

/// Request or response carrying only an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdMessage {
    /// User id
    pub id: u32,
}

/// Fields for `CreateUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Age in years
    pub age: u32,
}

/// A full user as sent over the wire; also the `UpdateUser` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserObject {
    /// User id
    pub id: u32,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Age in years
    pub age: u32,
}

impl From<User> for UserObject {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: u32::from(user.age),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable status, e.g. `not_found`
    pub code: String,
    /// Human-readable detail
    pub message: String,
}
