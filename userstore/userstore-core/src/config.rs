//! Storage Configuration
//!
//! TigerStyle: Read once, validated up front, never re-read.
//!
//! Backends are chosen by the `STORAGE` key. Each backend reads its own
//! connection keys; see [`StorageConfig::from_lookup`] for the full list.

use std::fmt;

use crate::constants::{MONGO_DATABASE_DEFAULT, POSTGRES_PORT_DEFAULT, REDIS_ADDR_DEFAULT};
use crate::storage::{StorageError, StorageResult};

// =============================================================================
// Backend Kind
// =============================================================================

/// Tag naming one storage medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-local table
    InMemory,
    /// Redis key-value store
    Redis,
    /// MongoDB document store
    Mongo,
    /// PostgreSQL table
    Postgres,
    /// Elasticsearch index
    Elastic,
}

impl BackendKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InMemory => "in-memory",
            Self::Redis => "redis",
            Self::Mongo => "mongo",
            Self::Postgres => "postgres",
            Self::Elastic => "elastic",
        }
    }

    /// Parse a `STORAGE` selector value.
    ///
    /// An empty selector means in-memory. Unknown names are rejected.
    ///
    /// # Errors
    /// Returns [`StorageError::Config`] for unrecognized names.
    pub fn parse(s: &str) -> StorageResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "in-memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            "mongo" => Ok(Self::Mongo),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "elastic" => Ok(Self::Elastic),
            other => Err(StorageError::Config(format!(
                "unknown storage backend `{other}`"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Per-backend Parameters
// =============================================================================

/// Redis connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `host:port`, or a full `redis://` URL
    pub addr: String,
    /// Optional password
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: REDIS_ADDR_DEFAULT.to_string(),
            password: None,
            db: 0,
        }
    }
}

/// MongoDB connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// `host:port`, or a full `mongodb://` URI
    pub addr: String,
    /// Database holding the `users` collection
    pub database: String,
}

impl MongoConfig {
    /// Connection URI understood by the mongodb driver.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.addr.starts_with("mongodb://") || self.addr.starts_with("mongodb+srv://") {
            self.addr.clone()
        } else {
            format!("mongodb://{}", self.addr)
        }
    }
}

/// PostgreSQL connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Role name
    pub user: String,
    /// Role password
    pub password: String,
    /// Database name
    pub database: String,
}

/// When Elasticsearch makes a write visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Visible after the next periodic refresh (reads may be stale)
    #[default]
    None,
    /// Force a refresh after each write
    Immediate,
    /// Block each write until a refresh makes it visible
    WaitFor,
}

impl RefreshPolicy {
    /// Value for the `refresh` query parameter.
    #[must_use]
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::None => "false",
            Self::Immediate => "true",
            Self::WaitFor => "wait_for",
        }
    }

    /// Parse an `ELASTIC_REFRESH` value.
    ///
    /// # Errors
    /// Returns [`StorageError::Config`] for unrecognized values.
    pub fn parse(s: &str) -> StorageResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "false" => Ok(Self::None),
            "true" => Ok(Self::Immediate),
            "wait_for" => Ok(Self::WaitFor),
            other => Err(StorageError::Config(format!(
                "ELASTIC_REFRESH must be false, true or wait_for, got `{other}`"
            ))),
        }
    }
}

/// Elasticsearch connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub addr: String,
    /// Basic-auth user
    pub user: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Write visibility policy
    pub refresh: RefreshPolicy,
}

// =============================================================================
// StorageConfig
// =============================================================================

/// The selected backend together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// No parameters
    InMemory,
    /// Redis parameters
    Redis(RedisConfig),
    /// MongoDB parameters
    Mongo(MongoConfig),
    /// PostgreSQL parameters
    Postgres(PostgresConfig),
    /// Elasticsearch parameters
    Elastic(ElasticConfig),
}

impl BackendConfig {
    /// Which medium this configuration selects.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::InMemory => BackendKind::InMemory,
            Self::Redis(_) => BackendKind::Redis,
            Self::Mongo(_) => BackendKind::Mongo,
            Self::Postgres(_) => BackendKind::Postgres,
            Self::Elastic(_) => BackendKind::Elastic,
        }
    }
}

/// Storage configuration consumed by [`new_storage`](crate::new_storage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: BackendConfig,
}

impl StorageConfig {
    /// Configuration for the in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: BackendConfig::InMemory,
        }
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// See [`StorageConfig::from_lookup`].
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`.
    ///
    /// | Key | Used by | Default |
    /// |---|---|---|
    /// | `STORAGE` | selector | `in-memory` |
    /// | `REDIS_ADDR`, `REDIS_PASSWORD`, `REDIS_DB` | redis | `localhost:6379`, none, `0` |
    /// | `MONGO_ADDR`, `MONGO_DB` | mongo | required, `grpc_db` |
    /// | `POSTGRE_HOST`, `POSTGRE_PORT`, `POSTGRE_USER`, `POSTGRE_PASS`, `POSTGRE_DB` | postgres | port `5432`, rest required |
    /// | `ELASTIC_ADDR`, `ELASTIC_USER`, `ELASTIC_PASS`, `ELASTIC_REFRESH` | elastic | required, none, none, `false` |
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    /// Returns [`StorageError::Config`] for an unknown selector, a missing
    /// required key, an unparsable number, or `ELASTIC_PASS` without
    /// `ELASTIC_USER`.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| StorageError::Config(format!("{key} must be set")))
        };

        let kind = BackendKind::parse(&get("STORAGE").unwrap_or_default())?;
        let backend = match kind {
            BackendKind::InMemory => BackendConfig::InMemory,
            BackendKind::Redis => BackendConfig::Redis(RedisConfig {
                addr: get("REDIS_ADDR").unwrap_or_else(|| REDIS_ADDR_DEFAULT.to_string()),
                password: get("REDIS_PASSWORD"),
                db: parse_number("REDIS_DB", get("REDIS_DB"))?.unwrap_or(0),
            }),
            BackendKind::Mongo => BackendConfig::Mongo(MongoConfig {
                addr: require("MONGO_ADDR")?,
                database: get("MONGO_DB").unwrap_or_else(|| MONGO_DATABASE_DEFAULT.to_string()),
            }),
            BackendKind::Postgres => BackendConfig::Postgres(PostgresConfig {
                host: require("POSTGRE_HOST")?,
                port: parse_number("POSTGRE_PORT", get("POSTGRE_PORT"))?
                    .unwrap_or(POSTGRES_PORT_DEFAULT),
                user: require("POSTGRE_USER")?,
                password: require("POSTGRE_PASS")?,
                database: require("POSTGRE_DB")?,
            }),
            BackendKind::Elastic => {
                let user = get("ELASTIC_USER");
                let password = get("ELASTIC_PASS");
                if user.is_none() && password.is_some() {
                    return Err(StorageError::Config(
                        "ELASTIC_PASS is set but ELASTIC_USER is not".to_string(),
                    ));
                }
                BackendConfig::Elastic(ElasticConfig {
                    addr: require("ELASTIC_ADDR")?,
                    user,
                    password,
                    refresh: RefreshPolicy::parse(&get("ELASTIC_REFRESH").unwrap_or_default())?,
                })
            }
        };

        Ok(Self { backend })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> StorageResult<Option<T>>
where
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| StorageError::Config(format!("{key}=`{v}` is not a number: {e}")))
        })
        .transpose()
}
