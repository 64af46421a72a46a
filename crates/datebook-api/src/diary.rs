//! Handlers for `/diary-entries` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/diary-entries` | Body: [`NewDiaryEntry`]; returns 201 + stored entry |
//! | `GET`  | `/diary-entries?user_id=` | Newest first |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use datebook_core::{
  diary::{DiaryEntry, NewDiaryEntry},
  event::UserId,
  notify::Notifier,
  store::CalendarStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// `POST /diary-entries`
pub async fn append<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<NewDiaryEntry>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let entry = state.service.append_diary_entry(body).await?;
  Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id: UserId,
}

/// `GET /diary-entries?user_id=<id>`
pub async fn list<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DiaryEntry>>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.list_diary_entries(params.user_id).await?))
}
