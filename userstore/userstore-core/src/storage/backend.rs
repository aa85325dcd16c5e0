//! StorageBackend - The Contract Every Medium Implements

use async_trait::async_trait;

use super::error::StorageResult;
use super::user::{User, UserFields, UserId};
use crate::config::BackendKind;

/// Storage contract for user records.
///
/// Implementations are shared across request tasks behind an `Arc`, so every
/// method takes `&self` and the type must be `Send + Sync`.
///
/// # Invariants
///
/// - `add` assigns an id no concurrent `add` on the same instance receives
/// - `update` never changes the id
/// - `retrieve`, `remove` and `update` on an absent id return
///   [`StorageError::NotFound`](super::StorageError::NotFound), never a
///   medium failure
/// - `get_all` ordering is unspecified
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which medium this backend talks to.
    fn kind(&self) -> BackendKind;

    /// List every stored user, in no particular order.
    async fn get_all(&self) -> StorageResult<Vec<User>>;

    /// Fetch one user by id.
    async fn retrieve(&self, id: UserId) -> StorageResult<User>;

    /// Store a new user under a freshly assigned id.
    async fn add(&self, fields: UserFields) -> StorageResult<User>;

    /// Delete a user permanently, returning the removed id.
    async fn remove(&self, id: UserId) -> StorageResult<UserId>;

    /// Replace name, email and age of an existing user.
    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User>;
}
