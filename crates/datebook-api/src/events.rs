//! Handlers for `/events` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/events?user_id=` | Owned and joined events, viewer-local times |
//! | `POST`   | `/events` | Body: [`CreateEvent`]; 201, 409 on conflict, 422 on bad input |
//! | `PUT`    | `/events/{id}` | Body: [`UpdateEvent`]; full replacement |
//! | `DELETE` | `/events/{id}` | Body: `{"actor_id":1}`; 404 unless the actor owns it |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use datebook_core::{
  event::{EventId, UserId},
  notify::{DeliveryReport, Notifier},
  service::{CreateEvent, EventView, Scheduled, UpdateEvent},
  store::CalendarStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id: UserId,
}

/// `GET /events?user_id=<id>`
pub async fn list<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EventView>>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.list_events(params.user_id).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /events`: returns 201 + the stored event and its delivery report.
pub async fn create<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<CreateEvent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let scheduled = state.service.create_event(body).await?;
  Ok((StatusCode::CREATED, Json(scheduled)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /events/{id}`
pub async fn update<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<EventId>,
  Json(body): Json<UpdateEvent>,
) -> Result<Json<Scheduled>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.update_event(id, body).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
  pub actor_id: UserId,
}

/// `DELETE /events/{id}`: returns who was told about the cancellation.
pub async fn remove<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<EventId>,
  Json(body): Json<DeleteBody>,
) -> Result<Json<DeliveryReport>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.delete_event(id, body.actor_id).await?))
}
