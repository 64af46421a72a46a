//! `POST /reminders/run`: one claim-and-dispatch pass on demand.
//!
//! The server also runs passes on a timer; both paths share the same claim,
//! so a manual run never duplicates a reminder the timer already sent.

use axum::{Json, extract::State};
use datebook_core::{notify::Notifier, reminder::ReminderPass, store::CalendarStore};

use crate::{AppState, error::ApiError};

pub async fn run<S, N>(
  State(state): State<AppState<S, N>>,
) -> Result<Json<ReminderPass>, ApiError>
where
  S: CalendarStore,
  N: Notifier,
{
  Ok(Json(state.scheduler.run_once().await?))
}
