//! RedisBackend - Key-Value Storage
//!
//! TigerStyle: Flat namespace, one JSON blob per id, atomic existence checks.
//!
//! # Layout
//!
//! ```text
//! "1"  -> {"id":1,"name":"Alice","email":"alice@example.com","age":30}
//! "2"  -> {"id":2,...}
//! ```
//!
//! Redis has no max-aggregation, so the watermark is recovered by scanning
//! every key and keeping the largest one that parses as an id. Keys that do
//! not parse are skipped.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};

use super::allocator::{parse_id, IdAllocator};
use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::user::{User, UserFields, UserId};
use crate::config::{BackendKind, RedisConfig};
use crate::constants::{REDIS_PORT_DEFAULT, REDIS_SCAN_COUNT};

// =============================================================================
// RedisBackend
// =============================================================================

/// Redis storage backend.
///
/// The connection manager multiplexes one connection and reconnects on
/// failure; cloning it per operation is cheap.
pub struct RedisBackend {
    conn: ConnectionManager,
    ids: IdAllocator,
}

impl RedisBackend {
    /// Connect and recover the id watermark.
    ///
    /// # Errors
    /// Returns a config error for an unusable `REDIS_ADDR`, a connection
    /// failure if Redis is unreachable, or a read failure if the key scan
    /// fails.
    pub async fn connect(config: &RedisConfig) -> StorageResult<Self> {
        let client = redis::Client::open(connection_info(config)?)
            .map_err(|e| StorageError::connection(format!("invalid redis address: {e}")))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| StorageError::connection(format!("ping failed: {e}")))?;

        let ids = IdAllocator::recover(scan_ids(&mut conn).await?);
        tracing::info!(addr = %config.addr, watermark = ids.watermark(), "connected to redis");

        Ok(Self { conn, ids })
    }

    /// The highest id issued so far.
    #[must_use]
    pub fn watermark(&self) -> UserId {
        self.ids.watermark()
    }

    /// Delete every user key. Non-numeric keys are left alone.
    ///
    /// # Errors
    /// Returns a medium failure if the scan or delete fails.
    pub async fn clear(&self) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = scan_ids(&mut conn)
            .await?
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        redis::cmd("DEL")
            .arg(&keys)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| StorageError::write(format!("failed to clear users: {e}")))?;
        Ok(())
    }
}

/// Translate the config into client connection parameters.
///
/// The password is passed through verbatim, never embedded in a URL. A
/// full `redis://` address is parsed as-is, with `REDIS_PASSWORD` taking
/// precedence over any password it carries.
fn connection_info(config: &RedisConfig) -> StorageResult<ConnectionInfo> {
    if config.addr.starts_with("redis://") || config.addr.starts_with("rediss://") {
        let mut info = config
            .addr
            .as_str()
            .into_connection_info()
            .map_err(|e| StorageError::Config(format!("invalid REDIS_ADDR: {e}")))?;
        if config.password.is_some() {
            info.redis.password.clone_from(&config.password);
        }
        return Ok(info);
    }

    let (host, port) = match config.addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                StorageError::Config(format!("invalid port in REDIS_ADDR {:?}: {e}", config.addr))
            })?;
            (host, port)
        }
        None => (config.addr.as_str(), REDIS_PORT_DEFAULT),
    };
    if host.is_empty() {
        return Err(StorageError::Config(format!(
            "REDIS_ADDR {:?} has no host",
            config.addr
        )));
    }

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password.clone(),
            ..RedisConnectionInfo::default()
        },
    })
}

/// Walk the keyspace with `SCAN`, returning every key that parses as an id.
///
/// `SCAN` may yield a key more than once; the result is sorted and deduped.
async fn scan_ids(conn: &mut ConnectionManager) -> StorageResult<Vec<UserId>> {
    let mut ids = Vec::new();
    let mut cursor: u64 = 0;

    loop {
        let reply: redis::Value = redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(REDIS_SCAN_COUNT)
            .query_async(conn)
            .await
            .map_err(|e| StorageError::read(format!("failed to scan keys: {e}")))?;

        let (next, batch) = parse_scan_reply(&reply)?;
        ids.extend(batch);

        if next == 0 {
            break;
        }
        cursor = next;
    }

    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Split one `SCAN` reply into the next cursor and the ids in this batch.
///
/// Keys are read as raw bytes; a key that is not UTF-8 or not a decimal id
/// is skipped without affecting the rest of the batch.
fn parse_scan_reply(reply: &redis::Value) -> StorageResult<(u64, Vec<UserId>)> {
    let (next, keys): (u64, Vec<Vec<u8>>) = redis::from_redis_value(reply)
        .map_err(|e| StorageError::read(format!("unexpected SCAN reply: {e}")))?;

    let ids = keys
        .iter()
        .filter_map(|key| match std::str::from_utf8(key) {
            Ok(key) => parse_id(key),
            Err(_) => {
                tracing::warn!(key = ?key, "skipping key that is not valid UTF-8");
                None
            }
        })
        .collect();
    Ok((next, ids))
}

fn decode(id: UserId, blob: &str) -> StorageResult<User> {
    let stored: User = serde_json::from_str(blob)
        .map_err(|e| StorageError::serialization(format!("bad record under key {id}: {e}")))?;
    // The key is authoritative for the id.
    Ok(User { id, ..stored })
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        let mut conn = self.conn.clone();
        let ids = scan_ids(&mut conn).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let blobs: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::read(format!("failed to fetch users: {e}")))?;

        let mut users = Vec::with_capacity(ids.len());
        // A key removed between SCAN and MGET comes back as nil.
        for (id, blob) in ids.into_iter().zip(blobs) {
            if let Some(blob) = blob {
                users.push(decode(id, &blob)?);
            }
        }
        Ok(users)
    }

    async fn retrieve(&self, id: UserId) -> StorageResult<User> {
        let mut conn = self.conn.clone();
        let blob: Option<String> = redis::cmd("GET")
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::read(format!("failed to get user: {e}")))?;

        match blob {
            Some(blob) => decode(id, &blob),
            None => Err(StorageError::not_found(id)),
        }
    }

    async fn add(&self, fields: UserFields) -> StorageResult<User> {
        let id = self.ids.next_id();
        let user = User::from_fields(id, fields);
        let blob = serde_json::to_string(&user)?;

        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(id.to_string())
            .arg(blob)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::write(format!("failed to add user: {e}")))?;

        if reply.is_none() {
            return Err(StorageError::write(format!(
                "key {id} already exists; watermark is behind the keyspace"
            )));
        }

        tracing::debug!(id, "added user");
        Ok(user)
    }

    async fn remove(&self, id: UserId) -> StorageResult<UserId> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::write(format!("failed to remove user: {e}")))?;

        if deleted == 0 {
            return Err(StorageError::not_found(id));
        }
        Ok(id)
    }

    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User> {
        let user = User::from_fields(id, fields);
        let blob = serde_json::to_string(&user)?;

        let mut conn = self.conn.clone();
        // XX: only overwrite an existing key, so a missing id stays missing.
        let reply: Option<String> = redis::cmd("SET")
            .arg(id.to_string())
            .arg(blob)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::write(format!("failed to update user: {e}")))?;

        match reply {
            Some(_) => Ok(user),
            None => Err(StorageError::not_found(id)),
        }
    }
}

// =============================================================================
// Tests (require running Redis)
// =============================================================================
