//! Contract checks every storage backend must pass.
//!
//! The in-memory backend always runs. Live media run when their feature is
//! compiled in and the matching `TEST_*_URL` variable is set; otherwise the
//! test prints a skip message and returns.

use std::collections::HashSet;
use std::sync::Arc;

use userstore_core::{MemoryBackend, StorageBackend, User, UserFields, UserId};

// =============================================================================
// Shared Checks
// =============================================================================

fn fields(tag: &str, age: u8) -> UserFields {
    UserFields::new(format!("user-{tag}"), format!("{tag}@example.com"), age)
}

async fn check_round_trip(storage: &dyn StorageBackend) {
    let input = fields("round-trip", 33);
    let added = storage.add(input.clone()).await.unwrap();
    assert_eq!(added.fields(), input);

    let fetched = storage.retrieve(added.id).await.unwrap();
    assert_eq!(fetched, User::from_fields(added.id, input));
}

async fn check_update_keeps_id_and_is_idempotent(storage: &dyn StorageBackend) {
    let added = storage.add(fields("before", 20)).await.unwrap();
    let changed = fields("after", 21);

    let once = storage.update(added.id, changed.clone()).await.unwrap();
    assert_eq!(once.id, added.id);
    let after_once = storage.retrieve(added.id).await.unwrap();

    let twice = storage.update(added.id, changed.clone()).await.unwrap();
    assert_eq!(twice, once);
    let after_twice = storage.retrieve(added.id).await.unwrap();

    assert_eq!(after_once, after_twice);
    assert_eq!(after_twice, User::from_fields(added.id, changed));
}

async fn check_not_found_symmetry(storage: &dyn StorageBackend) {
    let gone = storage.add(fields("gone", 50)).await.unwrap();
    storage.remove(gone.id).await.unwrap();

    let never: UserId = 4_000_000_000;
    for id in [gone.id, never] {
        assert!(storage.retrieve(id).await.unwrap_err().is_not_found());
        assert!(storage.remove(id).await.unwrap_err().is_not_found());
        assert!(storage
            .update(id, fields("ghost", 1))
            .await
            .unwrap_err()
            .is_not_found());
    }
}

/// Listing is exactly the set of live records: whatever was there before,
/// plus r1 and r3, and nothing else.
async fn check_listing(storage: &dyn StorageBackend) {
    let before: HashSet<User> = storage.get_all().await.unwrap().into_iter().collect();

    let r1 = storage.add(fields("list-1", 1)).await.unwrap();
    let r2 = storage.add(fields("list-2", 2)).await.unwrap();
    let r3 = storage.add(fields("list-3", 3)).await.unwrap();
    assert_eq!(storage.remove(r2.id).await.unwrap(), r2.id);

    let listed: HashSet<User> = storage.get_all().await.unwrap().into_iter().collect();
    let mut expected = before;
    expected.insert(r1);
    expected.insert(r3);
    assert_eq!(listed, expected);
}

async fn check_concurrent_adds_are_unique(storage: Arc<dyn StorageBackend>) {
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move { storage.add(fields(&format!("c{i}"), 9)).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let user = handle.await.unwrap().unwrap();
        assert!(ids.insert(user.id), "id {} assigned twice", user.id);
    }
    assert_eq!(ids.len(), 32);
}

async fn run_contract(storage: Arc<dyn StorageBackend>) {
    check_round_trip(storage.as_ref()).await;
    check_update_keeps_id_and_is_idempotent(storage.as_ref()).await;
    check_not_found_symmetry(storage.as_ref()).await;
    check_listing(storage.as_ref()).await;
    check_concurrent_adds_are_unique(storage).await;
}

// =============================================================================
// In-memory
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_contract() {
    run_contract(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test]
async fn test_memory_listing_is_exact() {
    let storage = MemoryBackend::new();
    let r1 = storage.add(fields("1", 1)).await.unwrap();
    let r2 = storage.add(fields("2", 2)).await.unwrap();
    let r3 = storage.add(fields("3", 3)).await.unwrap();
    assert_eq!((r1.id, r2.id, r3.id), (1, 2, 3));

    storage.remove(2).await.unwrap();

    let listed: HashSet<User> = storage.get_all().await.unwrap().into_iter().collect();
    assert_eq!(listed, HashSet::from([r1, r3]));
}

#[tokio::test]
async fn test_memory_allocator_recovery() {
    let existing = (1..=5).map(|id| User::from_fields(id * 3, fields("seed", 1)));
    let storage = MemoryBackend::with_users(existing);

    let next = storage.add(fields("next", 2)).await.unwrap();
    assert_eq!(next.id, 16);
}

// =============================================================================
// Live Media
// =============================================================================

#[cfg(feature = "redis")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redis_contract() {
    let Ok(url) = std::env::var("TEST_REDIS_URL") else {
        eprintln!("Skipping test: TEST_REDIS_URL not set");
        return;
    };
    let config = userstore_core::RedisConfig {
        addr: url,
        ..Default::default()
    };
    let backend = userstore_core::RedisBackend::connect(&config).await.unwrap();
    backend.clear().await.unwrap();
    let backend = Arc::new(backend);

    run_contract(backend.clone()).await;

    // A fresh instance continues after the largest surviving key
    let watermark = backend.watermark();
    let restarted = userstore_core::RedisBackend::connect(&config).await.unwrap();
    let next = restarted.add(fields("restart", 5)).await.unwrap();
    assert_eq!(next.id, watermark + 1);

    restarted.clear().await.unwrap();
}

#[cfg(feature = "mongo")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mongo_contract() {
    let Ok(url) = std::env::var("TEST_MONGO_URL") else {
        eprintln!("Skipping test: TEST_MONGO_URL not set");
        return;
    };
    let config = userstore_core::MongoConfig {
        addr: url,
        database: "userstore_contract".to_string(),
    };
    let backend = userstore_core::MongoBackend::connect(&config).await.unwrap();
    backend.clear().await.unwrap();
    let backend = Arc::new(backend);

    run_contract(backend.clone()).await;

    let watermark = backend.watermark();
    let restarted = userstore_core::MongoBackend::connect(&config).await.unwrap();
    let next = restarted.add(fields("restart", 5)).await.unwrap();
    assert_eq!(next.id, watermark + 1);

    restarted.clear().await.unwrap();
}

#[cfg(feature = "postgres")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_postgres_contract() {
    let Ok(url) = std::env::var("TEST_POSTGRES_URL") else {
        eprintln!("Skipping test: TEST_POSTGRES_URL not set");
        return;
    };
    let pool = sqlx::PgPool::connect(&url).await.unwrap();
    let backend = userstore_core::PostgresBackend::from_pool(pool).await.unwrap();
    backend.clear().await.unwrap();
    let backend = Arc::new(backend);

    run_contract(backend.clone()).await;

    backend.clear().await.unwrap();
}

#[cfg(feature = "elastic")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_elastic_contract() {
    let Ok(url) = std::env::var("TEST_ELASTIC_URL") else {
        eprintln!("Skipping test: TEST_ELASTIC_URL not set");
        return;
    };
    // wait_for makes read-after-write deterministic for the checks above
    let config = userstore_core::ElasticConfig {
        addr: url,
        user: std::env::var("TEST_ELASTIC_USER").ok(),
        password: std::env::var("TEST_ELASTIC_PASS").ok(),
        refresh: userstore_core::RefreshPolicy::WaitFor,
    };
    let backend = userstore_core::ElasticBackend::connect(&config).await.unwrap();
    backend.clear().await.unwrap();
    let backend = Arc::new(backend);

    run_contract(backend.clone()).await;

    let watermark = backend.watermark();
    let restarted = userstore_core::ElasticBackend::connect(&config).await.unwrap();
    let next = restarted.add(fields("restart", 5)).await.unwrap();
    assert_eq!(next.id, watermark + 1);

    restarted.clear().await.unwrap();
}
