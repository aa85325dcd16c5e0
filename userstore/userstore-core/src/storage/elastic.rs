//! ElasticBackend - Search Index Storage
//!
//! TigerStyle: REST calls against one index, eventual consistency stated up front.
//!
//! # Layout
//!
//! ```text
//! index "user"
//!   _id "1"  _source {"id":1,"name":"Alice","email":"alice@example.com","age":30}
//! ```
//!
//! # Consistency
//!
//! Reads go through `_search`, which only sees documents after an index
//! refresh. With the default [`RefreshPolicy::None`] a `retrieve` right
//! after `add` or `update` may return `NotFound` or the previous values.
//! Configure [`RefreshPolicy::WaitFor`] when read-after-write matters more
//! than write latency.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::allocator::{parse_id, IdAllocator};
use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::user::{User, UserFields, UserId};
use crate::config::{BackendKind, ElasticConfig, RefreshPolicy};
use crate::constants::{ELASTIC_INDEX_NAME, ELASTIC_LIST_SIZE_MAX, ID_WATERMARK_BASELINE};

// =============================================================================
// Response Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: SourceDoc,
}

/// Stored fields. The `id` copy in `_source` exists for the max
/// aggregation; `_id` is authoritative.
#[derive(Debug, Deserialize)]
struct SourceDoc {
    name: String,
    email: String,
    age: u8,
}

#[derive(Debug, Deserialize)]
struct MaxIdResponse {
    aggregations: Option<MaxIdAggregations>,
}

#[derive(Debug, Deserialize)]
struct MaxIdAggregations {
    max_id: MaxValue,
}

#[derive(Debug, Deserialize)]
struct MaxValue {
    value: Option<f64>,
}

impl SearchResponse {
    /// Convert hits to users, skipping hits whose `_id` is not numeric.
    fn into_users(self) -> Vec<User> {
        self.hits
            .hits
            .into_iter()
            .filter_map(|hit| {
                let id = parse_id(&hit.id)?;
                Some(User {
                    id,
                    name: hit.source.name,
                    email: hit.source.email,
                    age: hit.source.age,
                })
            })
            .collect()
    }
}

impl MaxIdResponse {
    fn watermark(&self) -> UserId {
        match self.aggregations.as_ref().and_then(|a| a.max_id.value) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some(v) if v >= 0.0 && v <= f64::from(UserId::MAX) => v as UserId,
            Some(v) => {
                tracing::warn!(value = v, "max id out of range, using baseline");
                ID_WATERMARK_BASELINE
            }
            None => ID_WATERMARK_BASELINE,
        }
    }
}

// =============================================================================
// ElasticBackend
// =============================================================================

/// Elasticsearch storage backend.
pub struct ElasticBackend {
    client: Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    refresh: RefreshPolicy,
    ids: IdAllocator,
}

impl ElasticBackend {
    /// Connect, ping, and recover the id watermark from a max aggregation.
    ///
    /// # Errors
    /// Returns a connection failure if the cluster is unreachable or
    /// rejects the credentials, or a read failure if the aggregation fails.
    pub async fn connect(config: &ElasticConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::connection(format!("failed to build http client: {e}")))?;

        let mut backend = Self {
            client,
            base_url: config.addr.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            refresh: config.refresh,
            ids: IdAllocator::empty(),
        };

        let ping = backend
            .request(Method::GET, "")
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("ping failed: {e}")))?;
        if !ping.status().is_success() {
            return Err(StorageError::connection(format!(
                "ping returned {}",
                ping.status()
            )));
        }

        backend.ids = IdAllocator::new(backend.last_id().await?);
        tracing::info!(
            addr = %backend.base_url,
            watermark = backend.ids.watermark(),
            refresh = backend.refresh.as_param(),
            "connected to elasticsearch"
        );

        Ok(backend)
    }

    /// The highest id issued so far.
    #[must_use]
    pub fn watermark(&self) -> UserId {
        self.ids.watermark()
    }

    /// Delete the index and everything in it.
    ///
    /// # Errors
    /// Returns a write failure if the delete fails for any reason other
    /// than the index being absent.
    pub async fn clear(&self) -> StorageResult<()> {
        let resp = self
            .request(Method::DELETE, ELASTIC_INDEX_NAME)
            .send()
            .await
            .map_err(|e| StorageError::write(format!("failed to clear users: {e}")))?;

        match resp.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(StorageError::write(failure_text("clear users", resp).await)),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{path}", self.base_url));
        match &self.user {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    fn write_path(&self, path: &str) -> String {
        format!("{ELASTIC_INDEX_NAME}/{path}?refresh={}", self.refresh.as_param())
    }

    async fn last_id(&self) -> StorageResult<UserId> {
        let resp = self
            .search(json!({
                "size": 0,
                "aggs": { "max_id": { "max": { "field": "id" } } }
            }))
            .await?;

        let Some(resp) = resp else {
            return Ok(ID_WATERMARK_BASELINE);
        };
        let body: MaxIdResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::serialization(format!("bad aggregation reply: {e}")))?;
        Ok(body.watermark())
    }

    /// Run a search. `None` means the index does not exist yet.
    async fn search(&self, body: serde_json::Value) -> StorageResult<Option<Response>> {
        let resp = self
            .request(Method::POST, &format!("{ELASTIC_INDEX_NAME}/_search"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::read(format!("search failed: {e}")))?;

        match resp.status() {
            s if s.is_success() => Ok(Some(resp)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(StorageError::read(failure_text("search", resp).await)),
        }
    }

    async fn search_users(&self, body: serde_json::Value) -> StorageResult<Vec<User>> {
        let Some(resp) = self.search(body).await? else {
            return Ok(Vec::new());
        };
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::serialization(format!("bad search reply: {e}")))?;
        Ok(body.into_users())
    }
}

async fn failure_text(op: &str, resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{op} returned {status}: {body}")
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for ElasticBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Elastic
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        self.search_users(json!({
            "size": ELASTIC_LIST_SIZE_MAX,
            "query": { "match_all": {} }
        }))
        .await
    }

    async fn retrieve(&self, id: UserId) -> StorageResult<User> {
        self.search_users(json!({
            "query": { "ids": { "values": [id.to_string()] } }
        }))
        .await?
        .into_iter()
        .find(|user| user.id == id)
        .ok_or(StorageError::not_found(id))
    }

    async fn add(&self, fields: UserFields) -> StorageResult<User> {
        let id = self.ids.next_id();
        let user = User::from_fields(id, fields);

        let resp = self
            .request(Method::PUT, &self.write_path(&format!("_create/{id}")))
            .json(&user)
            .send()
            .await
            .map_err(|e| StorageError::write(format!("failed to add user: {e}")))?;

        if !resp.status().is_success() {
            return Err(StorageError::write(failure_text("add user", resp).await));
        }

        tracing::debug!(id, "added user");
        Ok(user)
    }

    async fn remove(&self, id: UserId) -> StorageResult<UserId> {
        let resp = self
            .request(Method::DELETE, &self.write_path(&format!("_doc/{id}")))
            .send()
            .await
            .map_err(|e| StorageError::write(format!("failed to remove user: {e}")))?;

        match resp.status() {
            s if s.is_success() => Ok(id),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(id)),
            _ => Err(StorageError::write(failure_text("remove user", resp).await)),
        }
    }

    async fn update(&self, id: UserId, fields: UserFields) -> StorageResult<User> {
        let user = User::from_fields(id, fields);

        let resp = self
            .request(Method::POST, &self.write_path(&format!("_update/{id}")))
            .json(&json!({
                "doc": { "name": user.name, "email": user.email, "age": user.age }
            }))
            .send()
            .await
            .map_err(|e| StorageError::write(format!("failed to update user: {e}")))?;

        match resp.status() {
            s if s.is_success() => Ok(user),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(id)),
            _ => Err(StorageError::write(failure_text("update user", resp).await)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Get test cluster URL from environment.
    fn test_elastic_url() -> Option<String> {
        env::var("TEST_ELASTIC_URL").ok()
    }

    /// Skip test if no cluster available.
    macro_rules! require_elastic {
        () => {
            match test_elastic_url() {
                Some(url) => url,
                None => {
                    eprintln!("Skipping test: TEST_ELASTIC_URL not set");
                    return;
                }
            }
        };
    }

    #[test]
    fn test_search_reply_skips_foreign_ids() {
        let reply: SearchResponse = serde_json::from_value(json!({
            "took": 1,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_index": "user", "_id": "4",
                      "_source": { "id": 4, "name": "A", "email": "a@x", "age": 20 } },
                    { "_index": "user", "_id": "Xk2f9",
                      "_source": { "name": "B", "email": "b@x", "age": 21 } }
                ]
            }
        }))
        .unwrap();

        let users = reply.into_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0], User::from_fields(4, UserFields::new("A", "a@x", 20)));
    }

    #[test]
    fn test_max_id_reply() {
        let with_docs: MaxIdResponse =
            serde_json::from_value(json!({ "aggregations": { "max_id": { "value": 57.0 } } }))
                .unwrap();
        assert_eq!(with_docs.watermark(), 57);

        let empty: MaxIdResponse =
            serde_json::from_value(json!({ "aggregations": { "max_id": { "value": null } } }))
                .unwrap();
        assert_eq!(empty.watermark(), ID_WATERMARK_BASELINE);
    }

    #[tokio::test]
    async fn test_elastic_recovers_watermark() {
        let url = require_elastic!();
        let config = ElasticConfig {
            addr: url,
            user: env::var("TEST_ELASTIC_USER").ok(),
            password: env::var("TEST_ELASTIC_PASS").ok(),
            refresh: RefreshPolicy::WaitFor,
        };

        let backend = ElasticBackend::connect(&config).await.unwrap();
        backend.clear().await.unwrap();

        let restarted = ElasticBackend::connect(&config).await.unwrap();
        assert_eq!(restarted.watermark(), ID_WATERMARK_BASELINE);
        for _ in 0..3 {
            restarted
                .add(UserFields::new("A", "a@example.com", 20))
                .await
                .unwrap();
        }

        let again = ElasticBackend::connect(&config).await.unwrap();
        assert_eq!(again.watermark(), 3);

        again.clear().await.unwrap();
    }
}
