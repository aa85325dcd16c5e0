//! UserService - RPC Façade over Storage
//!
//! TigerStyle: One request, one storage call, one typed outcome.
//!
//! `NotFound` from storage becomes a per-call `not_found` error; medium
//! failures become `unavailable`. Neither takes the server down.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;
use userstore_core::{StorageBackend, StorageError, UserFields};

use crate::api::{ErrorBody, NewUser, UserIdMessage, UserObject};

// =============================================================================
// RpcError
// =============================================================================

/// Per-call failure returned to the RPC caller.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request is malformed.
    #[error("{0}")]
    InvalidArgument(String),

    /// The addressed user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The storage medium failed; the caller may retry.
    #[error("{0}")]
    Unavailable(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    /// Wire code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status carrying this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for RpcError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => Self::NotFound(e.to_string()),
            StorageError::Medium { .. } => {
                tracing::error!(error = %e, "storage failure");
                Self::Unavailable(e.to_string())
            }
            StorageError::Config(_) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// =============================================================================
// UserService
// =============================================================================

/// Translates `user.User` calls into storage operations.
pub struct UserService {
    storage: Arc<dyn StorageBackend>,
}

impl UserService {
    /// Serve requests from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// The backing storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// `GetUser`
    ///
    /// # Errors
    /// `not_found` if the id is absent, `unavailable` on medium failure.
    pub async fn get_user(&self, req: UserIdMessage) -> Result<UserObject, RpcError> {
        tracing::info!(id = req.id, "GetUser");
        Ok(self.storage.retrieve(req.id).await?.into())
    }

    /// `GetUsers`
    ///
    /// # Errors
    /// `unavailable` on medium failure.
    pub async fn get_users(&self) -> Result<Vec<UserObject>, RpcError> {
        tracing::info!("GetUsers");
        let users = self.storage.get_all().await?;
        Ok(users.into_iter().map(UserObject::from).collect())
    }

    /// `CreateUser`
    ///
    /// # Errors
    /// `invalid_argument` for empty fields or an age above 255,
    /// `unavailable` on medium failure.
    pub async fn create_user(&self, req: NewUser) -> Result<UserObject, RpcError> {
        let fields = validate_fields(req.name, req.email, req.age)?;
        let user = self.storage.add(fields).await?;
        tracing::info!(id = user.id, "CreateUser");
        Ok(user.into())
    }

    /// `UpdateUser`
    ///
    /// # Errors
    /// `invalid_argument` for bad fields, `not_found` if the id is absent,
    /// `unavailable` on medium failure.
    pub async fn update_user(&self, req: UserObject) -> Result<UserObject, RpcError> {
        tracing::info!(id = req.id, "UpdateUser");
        let fields = validate_fields(req.name, req.email, req.age)?;
        Ok(self.storage.update(req.id, fields).await?.into())
    }

    /// `DeleteUser`
    ///
    /// # Errors
    /// `not_found` if the id is absent, `unavailable` on medium failure.
    pub async fn delete_user(&self, req: UserIdMessage) -> Result<UserIdMessage, RpcError> {
        tracing::info!(id = req.id, "DeleteUser");
        let id = self.storage.remove(req.id).await?;
        Ok(UserIdMessage { id })
    }
}

fn validate_fields(name: String, email: String, age: u32) -> Result<UserFields, RpcError> {
    if name.trim().is_empty() {
        return Err(RpcError::InvalidArgument("name is required".to_string()));
    }
    if email.trim().is_empty() {
        return Err(RpcError::InvalidArgument("email is required".to_string()));
    }
    let age = u8::try_from(age)
        .map_err(|_| RpcError::InvalidArgument(format!("age {age} exceeds 255")))?;
    Ok(UserFields { name, email, age })
}

// =============================================================================
// Router
// =============================================================================

/// Build the HTTP router for `service`.
pub fn router(service: Arc<UserService>) -> Router {
    Router::new()
        .route("/user.User/GetUser", post(get_user))
        .route("/user.User/GetUsers", post(get_users))
        .route("/user.User/CreateUser", post(create_user))
        .route("/user.User/UpdateUser", post(update_user))
        .route("/user.User/DeleteUser", post(delete_user))
        .route("/healthz", get(healthz))
        .with_state(service)
}

async fn get_user(
    State(service): State<Arc<UserService>>,
    Json(req): Json<UserIdMessage>,
) -> Result<Json<UserObject>, RpcError> {
    service.get_user(req).await.map(Json)
}

async fn get_users(
    State(service): State<Arc<UserService>>,
) -> Result<Json<Vec<UserObject>>, RpcError> {
    service.get_users().await.map(Json)
}

async fn create_user(
    State(service): State<Arc<UserService>>,
    Json(req): Json<NewUser>,
) -> Result<Json<UserObject>, RpcError> {
    service.create_user(req).await.map(Json)
}

async fn update_user(
    State(service): State<Arc<UserService>>,
    Json(req): Json<UserObject>,
) -> Result<Json<UserObject>, RpcError> {
    service.update_user(req).await.map(Json)
}

async fn delete_user(
    State(service): State<Arc<UserService>>,
    Json(req): Json<UserIdMessage>,
) -> Result<Json<UserIdMessage>, RpcError> {
    service.delete_user(req).await.map(Json)
}

async fn healthz(State(service): State<Arc<UserService>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backend": service.storage().kind().as_str(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use userstore_core::MemoryBackend;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryBackend::new()))
    }

    fn new_user(age: u32) -> NewUser {
        NewUser {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            age,
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let svc = service();
        let created = svc.create_user(new_user(30)).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.age, 30);

        let fetched = svc.get_user(UserIdMessage { id: 1 }).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_age_above_255_is_rejected_not_truncated() {
        let svc = service();
        let err = svc.create_user(new_user(300)).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidArgument(_)));
        assert!(svc.get_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let svc = service();
        let mut req = new_user(20);
        req.name = "  ".to_string();
        let err = svc.create_user(req).await.unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[tokio::test]
    async fn test_missing_user_maps_to_not_found() {
        let svc = service();
        let err = svc.delete_user(UserIdMessage { id: 8 }).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "user 8 not found");
    }

    #[test]
    fn test_storage_error_mapping() {
        let unavailable: RpcError = StorageError::connection("refused").into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let internal: RpcError = StorageError::Config("bad".to_string()).into();
        assert_eq!(internal.code(), "internal");
    }
}
