//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use datebook_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let core = match self {
      ApiError::BadRequest(m) => {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response();
      }
      ApiError::Core(e) => e,
    };

    let message = core.to_string();
    match core {
      CoreError::Conflict(conflicts) => (
        StatusCode::CONFLICT,
        Json(json!({ "error": message, "conflicts": conflicts })),
      )
        .into_response(),
      CoreError::EventNotFound(_) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
      }
      CoreError::Store(_) => {
        // Backend details stay in the log.
        error!(error = %message, "store failure while handling request");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": "internal error" })),
        )
          .into_response()
      }
      e if e.is_validation() => {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": message }))).into_response()
      }
      _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response(),
    }
  }
}
