//! Handlers for `/budget` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/budget/contributions` | Body: [`NewContribution`]; 201 |
//! | `POST` | `/budget/expenses` | Body: [`RecordExpense`]; 201 with the day's status |
//! | `GET`  | `/budget/expenses?user_id=&limit=` | Newest first; both optional |
//! | `GET`  | `/budget/summary?user_id=` | Totals; `daily` in that user's zone |
//! | `GET`  | `/budget/daily-limit` | |
//! | `PUT`  | `/budget/daily-limit` | Body: [`SetDailyLimit`]; `null` clears |
//! | `GET`  | `/budget/daily-status?user_id=` | |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use datebook_core::{
  budget::{
    BudgetSummary, DailyLimit, DailyStatus, Expense, NewContribution, RecordExpense,
    SetDailyLimit,
  },
  event::UserId,
  notify::Notifier,
  store::CalendarStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ViewerParams {
  pub user_id: UserId,
}

// ─── Contributions and expenses ───────────────────────────────────────────────

/// `POST /budget/contributions`
pub async fn contribute<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<NewContribution>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let contribution = state.budget.add_contribution(body).await?;
  Ok((StatusCode::CREATED, Json(contribution)))
}

/// `POST /budget/expenses`
pub async fn spend<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<RecordExpense>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  let recorded = state.budget.record_expense(body).await?;
  Ok((StatusCode::CREATED, Json(recorded)))
}

#[derive(Debug, Deserialize)]
pub struct ExpenseParams {
  pub user_id: Option<UserId>,
  pub limit:   Option<usize>,
}

/// `GET /budget/expenses`
pub async fn expenses<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ExpenseParams>,
) -> Result<Json<Vec<Expense>>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.budget.list_expenses(params.user_id, params.limit).await?))
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// `GET /budget/summary?user_id=<id>`
pub async fn summary<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ViewerParams>,
) -> Result<Json<BudgetSummary>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.budget.summary(params.user_id).await?))
}

/// `GET /budget/daily-status?user_id=<id>`
pub async fn daily_status<S, N>(
  State(state): State<AppState<S, N>>,
  Query(params): Query<ViewerParams>,
) -> Result<Json<DailyStatus>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.budget.daily_status(params.user_id).await?))
}

// ─── Daily limit ──────────────────────────────────────────────────────────────

/// `GET /budget/daily-limit`
pub async fn get_daily_limit<S, N>(
  State(state): State<AppState<S, N>>,
) -> Result<Json<DailyLimit>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.budget.daily_limit().await?))
}

/// `PUT /budget/daily-limit`
pub async fn set_daily_limit<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<SetDailyLimit>,
) -> Result<Json<DailyLimit>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.budget.set_daily_limit(body).await?))
}
