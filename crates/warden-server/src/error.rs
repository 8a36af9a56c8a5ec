//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use warden_accounts::ErrorKind;
use warden_core::store::StoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Account(#[from] warden_accounts::Error),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing bearer token")]
  MissingToken,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("method not allowed")]
  MethodNotAllowed,
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self { Self::Account(e.into()) }
}

fn status_of(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::InvalidParam => StatusCode::BAD_REQUEST,
    ErrorKind::NotFound | ErrorKind::EmptyResult => StatusCode::NOT_FOUND,
    ErrorKind::DuplicateResource => StatusCode::CONFLICT,
    ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
    ErrorKind::InvalidToken => StatusCode::FORBIDDEN,
    ErrorKind::ConnectionFailure => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::QueryFailure | ErrorKind::Binding | ErrorKind::Internal => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Account(e) => {
        let status = status_of(e.kind());
        // Driver detail goes to the log only.
        if status.is_server_error() {
          tracing::error!(kind = ?e.kind(), error = %e, "request failed");
        } else {
          tracing::warn!(kind = ?e.kind(), error = %e, "request rejected");
        }
        (status, e.client_message())
      }
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::MissingToken => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
