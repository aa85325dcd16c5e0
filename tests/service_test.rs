//! Router-level tests: real HTTP requests through the axum app, in-memory
//! storage underneath.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use usersvc::service::{router, UserService};
use userstore_core::{
    BackendKind, MemoryBackend, StorageBackend, StorageError, StorageResult, User, UserFields,
    UserId,
};

fn app() -> Router {
    router(Arc::new(UserService::new(Arc::new(MemoryBackend::new()))))
}

async fn call(app: &Router, method: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/user.User/{method}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_user_lifecycle() {
    let app = app();

    let (status, created) = call(
        &app,
        "CreateUser",
        json!({ "name": "Alice", "email": "alice@example.com", "age": 30 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        created,
        json!({ "id": 1, "name": "Alice", "email": "alice@example.com", "age": 30 })
    );

    let (status, fetched) = call(&app, "GetUser", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = call(
        &app,
        "UpdateUser",
        json!({ "id": 1, "name": "Alice", "email": "alice@example.org", "age": 31 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], 1);
    assert_eq!(updated["email"], "alice@example.org");

    let (status, deleted) = call(&app, "DeleteUser", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({ "id": 1 }));

    let (status, body) = call(&app, "GetUser", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_get_users_lists_everything() {
    let app = app();
    for name in ["a", "b", "c"] {
        call(
            &app,
            "CreateUser",
            json!({ "name": name, "email": format!("{name}@example.com"), "age": 20 }),
        )
        .await;
    }
    call(&app, "DeleteUser", json!({ "id": 2 })).await;

    let (status, body) = call(&app, "GetUsers", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let mut ids: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_u64().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_not_found_for_update_and_delete() {
    let app = app();

    let (status, body) = call(
        &app,
        "UpdateUser",
        json!({ "id": 42, "name": "x", "email": "x@example.com", "age": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "user 42 not found");

    let (status, _) = call(&app, "DeleteUser", json!({ "id": 42 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_age_is_bad_request() {
    let app = app();
    let (status, body) = call(
        &app,
        "CreateUser",
        json!({ "name": "Old", "email": "old@example.com", "age": 256 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");
}

#[tokio::test]
async fn test_healthz_reports_backend() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["backend"], "in-memory");
}

/// Storage whose medium is always down.
struct UnreachableStorage;

#[async_trait]
impl StorageBackend for UnreachableStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn get_all(&self) -> StorageResult<Vec<User>> {
        Err(StorageError::connection("connection refused"))
    }

    async fn retrieve(&self, _id: UserId) -> StorageResult<User> {
        Err(StorageError::connection("connection refused"))
    }

    async fn add(&self, _fields: UserFields) -> StorageResult<User> {
        Err(StorageError::write("READONLY replica"))
    }

    async fn remove(&self, _id: UserId) -> StorageResult<UserId> {
        Err(StorageError::connection("connection refused"))
    }

    async fn update(&self, _id: UserId, _fields: UserFields) -> StorageResult<User> {
        Err(StorageError::connection("connection refused"))
    }
}

#[tokio::test]
async fn test_medium_failure_is_unavailable_not_crash() {
    let app = router(Arc::new(UserService::new(Arc::new(UnreachableStorage))));

    let (status, body) = call(&app, "GetUsers", json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unavailable");

    let (status, body) = call(
        &app,
        "CreateUser",
        json!({ "name": "A", "email": "a@example.com", "age": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "write failure: READONLY replica");

    // The app keeps serving after failures
    let (status, _) = call(&app, "GetUser", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
