//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: One contract, one adapter per medium, selected once at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageBackend Trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!     ↑            ↑            ↑             ↑             ↑
//! ┌───┴────┐  ┌────┴───┐  ┌─────┴───┐  ┌──────┴───┐  ┌──────┴───┐
//! │ Memory │  │ Redis  │  │  Mongo  │  │ Postgres │  │ Elastic  │
//! └────────┘  └────────┘  └─────────┘  └──────────┘  └──────────┘
//! ```
//!
//! Every adapter except Postgres owns an [`IdAllocator`] whose watermark is
//! recovered from the medium at construction. Postgres delegates ids to its
//! `SERIAL` sequence.

mod allocator;
mod backend;
mod error;
mod memory;
mod user;

#[cfg(feature = "redis")]
mod redis_store;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "elastic")]
mod elastic;

use std::sync::Arc;

pub use allocator::IdAllocator;
pub use backend::StorageBackend;
pub use error::{MediumFailureKind, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use user::{User, UserFields, UserId};

#[cfg(feature = "redis")]
pub use redis_store::RedisBackend;

#[cfg(feature = "mongo")]
pub use mongo::MongoBackend;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

#[cfg(feature = "elastic")]
pub use elastic::ElasticBackend;

use crate::config::{BackendConfig, StorageConfig};

/// Construct the backend named by `config`.
///
/// Connects to the medium and recovers the identifier watermark before
/// returning, so a returned backend is ready to serve.
///
/// # Errors
/// Returns [`StorageError::Config`] if the selected backend was not compiled
/// in, or a medium failure if the medium cannot be reached.
pub async fn new_storage(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match &config.backend {
        BackendConfig::InMemory => Arc::new(MemoryBackend::new()),

        #[cfg(feature = "redis")]
        BackendConfig::Redis(cfg) => Arc::new(RedisBackend::connect(cfg).await?),

        #[cfg(feature = "mongo")]
        BackendConfig::Mongo(cfg) => Arc::new(MongoBackend::connect(cfg).await?),

        #[cfg(feature = "postgres")]
        BackendConfig::Postgres(cfg) => Arc::new(PostgresBackend::connect(cfg).await?),

        #[cfg(feature = "elastic")]
        BackendConfig::Elastic(cfg) => Arc::new(ElasticBackend::connect(cfg).await?),

        #[allow(unreachable_patterns)]
        other => {
            return Err(StorageError::Config(format!(
                "backend `{}` is not compiled into this build",
                other.kind()
            )))
        }
    };

    tracing::info!(backend = %backend.kind(), "storage ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[tokio::test]
    async fn test_new_storage_in_memory() {
        let storage = new_storage(&StorageConfig::in_memory()).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::InMemory);
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_new_storage_rejects_missing_feature() {
        let config = StorageConfig {
            backend: BackendConfig::Redis(crate::config::RedisConfig::default()),
        };
        let err = new_storage(&config).await.err().unwrap();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
