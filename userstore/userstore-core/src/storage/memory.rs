//! MemoryBackend - Process-Local Storage
//!
//! TigerStyle: One mutex over the whole table. No durability, no network,
//! nothing to gain from finer locking.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::allocator::IdAllocator;
use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::user::{User, UserFields, UserId};
use crate::config::BackendKind;

/// In-memory user table.
///
/// The default backend when no medium is configured. Contents vanish with
/// the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    users: Mutex<HashMap<UserId, User>>,
    ids: IdAllocator,
}

impl MemoryBackend {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-populated with `users`.
    ///
    /// The watermark is recovered from the largest id present, as a
    /// persistent medium would on restart.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users: HashMap<UserId, User> = users.into_iter().map(|u| (u.id, u)).collect();
        let ids = IdAllocator::recover(users.keys().copied());
        Self {
            users: Mutex::new(users),
            ids,
        }
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    /// True if no users are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        Ok(self.users.lock().values().cloned().collect())
    }

    async fn retrieve(&self, id: UserId) -> StorageResult<User> {
        self.users
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StorageError::not_found(id))
    }

    async fn add(&self, fields: UserFields) -> StorageResult<User> {
        let mut users = self.users.lock();
        let id = self.ids.next_id();
        // A wrapped watermark must not clobber a live record.
        if users.contains_key(&id) {
            return Err(StorageError::write(format!("id {id} is still in use")));
        }

        let user = User::from_fields(id, fields);
        users.insert(id, user.clone());

        tracing::debug!(id, "added user");
        Ok(user)
    }

    async fn remove(&self, id: UserId) -> StorageResult<UserId> {
        match self.users.lock().remove(&id) {
            Some(removed) => {
                assert_eq!(removed.id, id, "removed record must match requested id");
                Ok(id)
            }
            None => Err(StorageError::not_found(id)),
        }
    }

    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User> {
        let mut users = self.users.lock();
        let slot = users.get_mut(&id).ok_or(StorageError::not_found(id))?;
        *slot = User::from_fields(id, fields);
        Ok(slot.clone())
    }
}
