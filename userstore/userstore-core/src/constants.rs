//! TigerStyle Constants
//!
//! Names carry units and bounds. Media layout names are fixed here so every
//! adapter and every test agrees on them.

// =============================================================================
// Identifiers
// =============================================================================

/// Watermark used when a medium holds no records; the first id issued is 1.
pub const ID_WATERMARK_BASELINE: u32 = 0;

// =============================================================================
// Key-value (Redis)
// =============================================================================

/// Default Redis address when `REDIS_ADDR` is unset.
pub const REDIS_ADDR_DEFAULT: &str = "localhost:6379";

/// Port assumed when `REDIS_ADDR` names only a host.
pub const REDIS_PORT_DEFAULT: u16 = 6379;

/// Keys requested per `SCAN` round trip.
pub const REDIS_SCAN_COUNT: usize = 100;

// =============================================================================
// Document store (MongoDB)
// =============================================================================

/// Default database name when `MONGO_DB` is unset.
pub const MONGO_DATABASE_DEFAULT: &str = "grpc_db";

/// Collection holding one document per user.
pub const MONGO_COLLECTION_NAME: &str = "users";

// =============================================================================
// Relational (PostgreSQL)
// =============================================================================

/// Default PostgreSQL port when `POSTGRE_PORT` is unset.
pub const POSTGRES_PORT_DEFAULT: u16 = 5432;

/// Maximum pooled connections per backend instance.
pub const POSTGRES_CONNECTIONS_MAX: u32 = 10;

// =============================================================================
// Search index (Elasticsearch)
// =============================================================================

/// Index holding one document per user.
pub const ELASTIC_INDEX_NAME: &str = "user";

/// Upper bound on hits returned by a full listing (the default
/// `index.max_result_window`).
pub const ELASTIC_LIST_SIZE_MAX: usize = 10_000;
