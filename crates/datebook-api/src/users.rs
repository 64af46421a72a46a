//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/users/{id}` | Body: `{"name":"Alice","tag":"@alice"}`; both optional |
//! | `GET`  | `/users/{id}/timezone` | Effective zone, `is_default` when unset |
//! | `PUT`  | `/users/{id}/timezone` | Body: `{"timezone":"Europe/Warsaw"}`; 422 if unknown |
//! | `GET`  | `/users/resolve?labels=a,b` | How each label would resolve as a participant |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use datebook_core::{
  event::UserId,
  notify::Notifier,
  participant::{Resolution, split_tokens},
  store::CalendarStore,
  user::{TimezoneSetting, User, UserUpsert},
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

// ─── Profile ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub name: Option<String>,
  pub tag:  Option<String>,
}

/// `PUT /users/{id}`
pub async fn upsert<S, N>(
  State(state): State<AppState<S, N>>,
  Path(user_id): Path<UserId>,
  Json(body): Json<UpsertBody>,
) -> Result<Json<User>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let user = state
    .service
    .observe_user(UserUpsert { user_id, name: body.name, tag: body.tag })
    .await?;
  Ok(Json(user))
}

// ─── Timezone ─────────────────────────────────────────────────────────────────

/// `GET /users/{id}/timezone`
pub async fn get_timezone<S, N>(
  State(state): State<AppState<S, N>>,
  Path(user_id): Path<UserId>,
) -> Result<Json<TimezoneSetting>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.timezone_of(user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TimezoneBody {
  pub timezone: String,
}

/// `PUT /users/{id}/timezone`
pub async fn set_timezone<S, N>(
  State(state): State<AppState<S, N>>,
  Path(user_id): Path<UserId>,
  Json(body): Json<TimezoneBody>,
) -> Result<Json<TimezoneSetting>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.service.set_timezone(user_id, &body.timezone).await?))
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
  /// Comma-separated participant tokens.
  pub labels: String,
}

/// `GET /users/resolve?labels=<a,b,...>`
pub async fn resolve<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ResolveParams>,
) -> Result<Json<Vec<Resolution>>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let tokens = split_tokens(&params.labels);
  if tokens.is_empty() {
    return Err(ApiError::BadRequest("no labels given".to_owned()));
  }
  Ok(Json(state.service.resolve_labels(&tokens).await?))
}
