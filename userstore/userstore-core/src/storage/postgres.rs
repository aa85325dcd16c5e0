//! PostgresBackend - Relational Storage
//!
//! TigerStyle: Parameterized statements only. The sequence owns id allocation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PostgresBackend                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::PgPool (connection pooling)                     │
//! │  Table: "user" (id SERIAL, name, email, age)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "user" (
//!     id SERIAL PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     age SMALLINT NOT NULL CHECK (age BETWEEN 0 AND 255)
//! );
//! ```
//!
//! No [`IdAllocator`](super::IdAllocator) is needed: `SERIAL` already hands
//! out unique ids under concurrency and survives restarts.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::user::{User, UserFields, UserId};
use crate::config::{BackendKind, PostgresConfig};
use crate::constants::POSTGRES_CONNECTIONS_MAX;

// =============================================================================
// PostgresBackend
// =============================================================================

/// PostgreSQL storage backend.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect with discrete parameters and ensure the table exists.
    ///
    /// # Errors
    /// Returns error if connection fails or the schema cannot be created.
    pub async fn connect(config: &PostgresConfig) -> StorageResult<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(POSTGRES_CONNECTIONS_MAX)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))?;

        tracing::info!(host = %config.host, database = %config.database, "connected to postgres");
        Self::from_pool(pool).await
    }

    /// Create from an existing pool.
    ///
    /// # Errors
    /// Returns error if the schema cannot be created.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Initialize database schema.
    async fn init_schema(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "user" (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                age SMALLINT NOT NULL CHECK (age BETWEEN 0 AND 255)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::write(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Delete every row.
    ///
    /// # Errors
    /// Returns a write failure if the delete fails.
    pub async fn clear(&self) -> StorageResult<()> {
        sqlx::query(r#"DELETE FROM "user""#)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to clear users: {e}")))?;
        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn to_db_id(id: UserId) -> StorageResult<i32> {
    i32::try_from(id).map_err(|_| StorageError::read(format!("id {id} exceeds SERIAL range")))
}

fn from_db_id(id: i32) -> StorageResult<UserId> {
    UserId::try_from(id).map_err(|_| StorageError::serialization(format!("negative id {id}")))
}

/// Parse a database row into a User.
fn row_to_user(row: &PgRow) -> StorageResult<User> {
    let id: i32 = row
        .try_get("id")
        .map_err(|e| StorageError::serialization(e.to_string()))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| StorageError::serialization(e.to_string()))?;
    let email: String = row
        .try_get("email")
        .map_err(|e| StorageError::serialization(e.to_string()))?;
    let age: i16 = row
        .try_get("age")
        .map_err(|e| StorageError::serialization(e.to_string()))?;

    let id = from_db_id(id)?;
    let age = u8::try_from(age)
        .map_err(|_| StorageError::serialization(format!("user {id} has age {age} out of range")))?;

    Ok(User {
        id,
        name,
        email,
        age,
    })
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        let rows = sqlx::query(r#"SELECT id, name, email, age FROM "user""#)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to list users: {e}")))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn retrieve(&self, id: UserId) -> StorageResult<User> {
        let Ok(db_id) = to_db_id(id) else {
            // Beyond the sequence range, so never assigned.
            return Err(StorageError::not_found(id));
        };

        let row = sqlx::query(r#"SELECT id, name, email, age FROM "user" WHERE id = $1"#)
            .bind(db_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to get user: {e}")))?;

        match row {
            Some(row) => {
                let user = row_to_user(&row)?;
                // Postcondition
                assert_eq!(user.id, id, "returned user must match requested id");
                Ok(user)
            }
            None => Err(StorageError::not_found(id)),
        }
    }

    async fn add(&self, fields: UserFields) -> StorageResult<User> {
        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO "user" (name, email, age) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(i16::from(fields.age))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::write(format!("failed to add user: {e}")))?;

        let id = from_db_id(id)?;
        tracing::debug!(id, "added user");
        Ok(User::from_fields(id, fields))
    }

    async fn remove(&self, id: UserId) -> StorageResult<UserId> {
        let Ok(db_id) = to_db_id(id) else {
            return Err(StorageError::not_found(id));
        };

        let removed: Option<i32> =
            sqlx::query_scalar(r#"DELETE FROM "user" WHERE id = $1 RETURNING id"#)
                .bind(db_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::write(format!("failed to remove user: {e}")))?;

        match removed {
            Some(removed) => from_db_id(removed),
            None => Err(StorageError::not_found(id)),
        }
    }

    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User> {
        let Ok(db_id) = to_db_id(id) else {
            return Err(StorageError::not_found(id));
        };

        let row = sqlx::query(
            r#"
            UPDATE "user" SET name = $1, email = $2, age = $3
            WHERE id = $4
            RETURNING id, name, email, age
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(i16::from(fields.age))
        .bind(db_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::write(format!("failed to update user: {e}")))?;

        match row {
            Some(row) => row_to_user(&row),
            None => Err(StorageError::not_found(id)),
        }
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================
