use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::background_jobs::JobError;
use crate::client_state::{ClientStateError, StateStorageError};
use crate::marketplace::OrderError;
use crate::user::AccountError;

use super::metrics;

/// Error returned by the JSON handlers, rendered as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            error!("Request failed: {:#}", e);
            metrics::record_error("internal", "api");
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(_) => ApiError::NotFound,
            OrderError::AlreadyAssigned(_) | OrderError::StatusChanged { .. } => {
                ApiError::Conflict(e.to_string())
            }
            OrderError::Database(db) => ApiError::Internal(db.into()),
            OrderError::Internal(inner) => ApiError::Internal(inner),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::HandleTaken(_) => ApiError::Conflict(e.to_string()),
            AccountError::Internal(inner) => ApiError::Internal(inner),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<StateStorageError> for ApiError {
    fn from(e: StateStorageError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<ClientStateError> for ApiError {
    fn from(e: ClientStateError) -> Self {
        match e {
            ClientStateError::Storage(storage) => storage.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound => ApiError::NotFound,
            JobError::AlreadyRunning => ApiError::Conflict(e.to_string()),
            other => ApiError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}
