//! JSON REST API for Datebook.
//!
//! Exposes an axum [`Router`] over an [`EventService`], a
//! [`ReminderScheduler`] and a [`BudgetService`], generic over the store and
//! the notifier.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", datebook_api::api_router(state))
//! ```

pub mod budget;
pub mod diary;
pub mod error;
pub mod events;
pub mod reminders;
pub mod users;

use std::sync::Arc;

use axum::{
  Json,
  Router,
  routing::{get, post, put},
};
use datebook_core::{
  budget::BudgetService,
  notify::Notifier,
  reminder::ReminderScheduler,
  service::EventService,
  store::CalendarStore,
};
use serde_json::{Value, json};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, N> {
  pub service:   Arc<EventService<S, N>>,
  pub scheduler: Arc<ReminderScheduler<S, N>>,
  pub budget:    Arc<BudgetService<S>>,
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      service:   Arc::clone(&self.service),
      scheduler: Arc::clone(&self.scheduler),
      budget:    Arc::clone(&self.budget),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(state: AppState<S, N>) -> Router<()>
where
  S: CalendarStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Events
    .route("/events", get(events::list::<S, N>).post(events::create::<S, N>))
    .route(
      "/events/{id}",
      put(events::update::<S, N>).delete(events::remove::<S, N>),
    )
    // Reminders
    .route("/reminders/run", post(reminders::run::<S, N>))
    // Users
    .route("/users/resolve", get(users::resolve::<S, N>))
    .route("/users/{id}", put(users::upsert::<S, N>))
    .route(
      "/users/{id}/timezone",
      get(users::get_timezone::<S, N>).put(users::set_timezone::<S, N>),
    )
    // Diary
    .route("/diary-entries", get(diary::list::<S, N>).post(diary::append::<S, N>))
    // Budget
    .route("/budget/contributions", post(budget::contribute::<S, N>))
    .route(
      "/budget/expenses",
      get(budget::expenses::<S, N>).post(budget::spend::<S, N>),
    )
    .route("/budget/summary", get(budget::summary::<S, N>))
    .route(
      "/budget/daily-limit",
      get(budget::get_daily_limit::<S, N>).put(budget::set_daily_limit::<S, N>),
    )
    .route("/budget/daily-status", get(budget::daily_status::<S, N>))
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
