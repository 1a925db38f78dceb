//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ess_core::{ErrorKind, StoreError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("invariant violation: {0}")]
  InvariantViolation(String),

  #[error("unsupported transition: {0}")]
  UnsupportedTransition(String),

  /// Details stay in the log under `correlation_id`.
  #[error("server error (correlation id {correlation_id})")]
  Server { correlation_id: Uuid },
}

impl ApiError {
  /// Classify a store error. Server errors carry only the correlation id.
  pub fn from_store<E: StoreError>(err: &E, correlation_id: Uuid) -> Self {
    match err.kind() {
      ErrorKind::NotFound => Self::NotFound(err.to_string()),
      ErrorKind::InvariantViolation => Self::InvariantViolation(err.to_string()),
      ErrorKind::UnsupportedTransition => {
        Self::UnsupportedTransition(err.to_string())
      }
      ErrorKind::Server => Self::Server { correlation_id },
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::UnsupportedTransition(_) => StatusCode::CONFLICT,
      ApiError::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Server { correlation_id } => json!({
        "error": self.to_string(),
        "correlation_id": correlation_id,
      }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
