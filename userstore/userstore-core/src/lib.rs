//! Userstore Core - User Records over Interchangeable Storage
//!
//! TigerStyle: One storage contract, five media, explicit failure modes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Arc<dyn StorageBackend>           │
//! ├─────────────────────────────────────────────┤
//! │  MemoryBackend    │ HashMap behind a mutex   │
//! │  RedisBackend     │ id -> JSON blob          │
//! │  MongoBackend     │ one document per id      │
//! │  PostgresBackend  │ "user" table, SERIAL id  │
//! │  ElasticBackend   │ "user" index (eventual)  │
//! ├─────────────────────────────────────────────┤
//! │  IdAllocator      │ per-instance watermark   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use userstore_core::{new_storage, StorageConfig, UserFields};
//!
//! # tokio_test::block_on(async {
//! let storage = new_storage(&StorageConfig::in_memory()).await.unwrap();
//! let user = storage
//!     .add(UserFields::new("Alice", "alice@example.com", 30))
//!     .await
//!     .unwrap();
//! assert_eq!(user.id, 1);
//! assert_eq!(storage.retrieve(1).await.unwrap(), user);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod storage;

// Re-export common types
pub use config::{
    BackendConfig, BackendKind, ElasticConfig, MongoConfig, PostgresConfig, RedisConfig,
    RefreshPolicy, StorageConfig,
};
pub use constants::*;
pub use storage::{
    new_storage, IdAllocator, MediumFailureKind, MemoryBackend, StorageBackend, StorageError,
    StorageResult, User, UserFields, UserId,
};

#[cfg(feature = "redis")]
pub use storage::RedisBackend;

#[cfg(feature = "mongo")]
pub use storage::MongoBackend;

#[cfg(feature = "postgres")]
pub use storage::PostgresBackend;

#[cfg(feature = "elastic")]
pub use storage::ElasticBackend;
