//! MongoBackend - Document Storage
//!
//! TigerStyle: One document per user, the user id doubles as `_id`.
//!
//! # Layout
//!
//! ```text
//! grpc_db.users
//!   { _id: NumberLong(1), name: "Alice", email: "alice@example.com", age: 30 }
//! ```
//!
//! The watermark is recovered by sorting on `_id` descending and taking the
//! first document. The sort is restricted to numeric `_id`s in `u32` range,
//! so documents written by other tools with `ObjectId` or string keys never
//! poison recovery; listing ignores them the same way.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, FindOneOptions, ReturnDocument};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

use super::allocator::IdAllocator;
use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::user::{User, UserFields, UserId};
use crate::config::{BackendKind, MongoConfig};
use crate::constants::{ID_WATERMARK_BASELINE, MONGO_COLLECTION_NAME};

// =============================================================================
// Document Mapping
// =============================================================================

/// On-disk shape of a user. BSON has no unsigned types.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: i64,
    name: String,
    email: String,
    age: i32,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            id: i64::from(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            age: i32::from(user.age),
        }
    }
}

impl TryFrom<UserDocument> for User {
    type Error = StorageError;

    fn try_from(doc: UserDocument) -> StorageResult<Self> {
        let id = UserId::try_from(doc.id)
            .map_err(|_| StorageError::serialization(format!("_id {} out of range", doc.id)))?;
        let age = u8::try_from(doc.age).map_err(|_| {
            StorageError::serialization(format!("user {id} has age {} out of range", doc.age))
        })?;
        Ok(User {
            id,
            name: doc.name,
            email: doc.email,
            age,
        })
    }
}

/// Filter matching documents whose `_id` is usable as a user id.
///
/// Integer types only: a `double` or `decimal` `_id` would not decode into
/// `UserDocument`, so such documents are left out of listing and recovery.
fn numeric_id_filter() -> Document {
    doc! { "_id": { "$type": ["int", "long"], "$gte": 0_i64, "$lte": i64::from(UserId::MAX) } }
}

fn id_filter(id: UserId) -> Document {
    doc! { "_id": i64::from(id) }
}

/// Extract a user id from a raw `_id` value.
fn id_from_bson(value: &Bson) -> Option<UserId> {
    match value {
        Bson::Int32(v) => UserId::try_from(*v).ok(),
        Bson::Int64(v) => UserId::try_from(*v).ok(),
        _ => None,
    }
}

// =============================================================================
// MongoBackend
// =============================================================================

/// MongoDB storage backend.
pub struct MongoBackend {
    users: Collection<UserDocument>,
    ids: IdAllocator,
}

impl MongoBackend {
    /// Connect, ping, and recover the id watermark.
    ///
    /// # Errors
    /// Returns a connection failure if the server is unreachable, or a read
    /// failure if the recovery query fails.
    pub async fn connect(config: &MongoConfig) -> StorageResult<Self> {
        let options = ClientOptions::parse(config.uri())
            .await
            .map_err(|e| StorageError::connection(format!("invalid mongo uri: {e}")))?;
        let client = Client::with_options(options)
            .map_err(|e| StorageError::connection(format!("failed to create client: {e}")))?;

        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StorageError::connection(format!("ping failed: {e}")))?;

        let users = db.collection::<UserDocument>(MONGO_COLLECTION_NAME);
        let ids = IdAllocator::new(last_id(&users).await?);
        tracing::info!(
            database = %config.database,
            watermark = ids.watermark(),
            "connected to mongo"
        );

        Ok(Self { users, ids })
    }

    /// The highest id issued so far.
    #[must_use]
    pub fn watermark(&self) -> UserId {
        self.ids.watermark()
    }

    /// Delete every document in the collection.
    ///
    /// # Errors
    /// Returns a write failure if the delete fails.
    pub async fn clear(&self) -> StorageResult<()> {
        self.users
            .delete_many(doc! {}, None)
            .await
            .map_err(|e| StorageError::write(format!("failed to clear users: {e}")))?;
        Ok(())
    }
}

/// Largest numeric `_id` in the collection, or the baseline if none.
async fn last_id(users: &Collection<UserDocument>) -> StorageResult<UserId> {
    let raw = users.clone_with_type::<Document>();
    let options = FindOneOptions::builder()
        .sort(doc! { "_id": -1 })
        .projection(doc! { "_id": 1 })
        .build();

    let top = raw
        .find_one(numeric_id_filter(), options)
        .await
        .map_err(|e| StorageError::read(format!("failed to find last id: {e}")))?;

    Ok(top
        .as_ref()
        .and_then(|doc| doc.get("_id"))
        .and_then(id_from_bson)
        .unwrap_or(ID_WATERMARK_BASELINE))
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for MongoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        let docs: Vec<UserDocument> = self
            .users
            .find(numeric_id_filter(), None)
            .await
            .map_err(|e| StorageError::read(format!("failed to list users: {e}")))?
            .try_collect()
            .await
            .map_err(|e| StorageError::read(format!("failed to read user cursor: {e}")))?;

        docs.into_iter().map(User::try_from).collect()
    }

    async fn retrieve(&self, id: UserId) -> StorageResult<User> {
        let doc = self
            .users
            .find_one(id_filter(id), None)
            .await
            .map_err(|e| StorageError::read(format!("failed to get user: {e}")))?;

        doc.ok_or(StorageError::not_found(id))?.try_into()
    }

    async fn add(&self, fields: UserFields) -> StorageResult<User> {
        let id = self.ids.next_id();
        let user = User::from_fields(id, fields);

        self.users
            .insert_one(UserDocument::from(&user), None)
            .await
            .map_err(|e| StorageError::write(format!("failed to add user: {e}")))?;

        tracing::debug!(id, "added user");
        Ok(user)
    }

    async fn remove(&self, id: UserId) -> StorageResult<UserId> {
        let result = self
            .users
            .delete_one(id_filter(id), None)
            .await
            .map_err(|e| StorageError::write(format!("failed to remove user: {e}")))?;

        if result.deleted_count == 0 {
            return Err(StorageError::not_found(id));
        }
        Ok(id)
    }

    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User> {
        let update = doc! {
            "$set": {
                "name": fields.name,
                "email": fields.email,
                "age": i32::from(fields.age),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let doc = self
            .users
            .find_one_and_update(id_filter(id), update, options)
            .await
            .map_err(|e| StorageError::write(format!("failed to update user: {e}")))?;

        doc.ok_or(StorageError::not_found(id))?.try_into()
    }
}

// =============================================================================
// Tests (require running MongoDB)
// =============================================================================
