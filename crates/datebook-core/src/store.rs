//! The `CalendarStore` trait.
//!
//! Implemented by storage backends (e.g. `datebook-store-sqlite`). The
//! orchestrator, scheduler and API depend on this abstraction only.
//!
//! The store never reasons about timezones: every instant it receives or
//! returns is UTC.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  budget::{Amount, BudgetTotals, Contribution, DailyLimit, Expense, NewContribution, NewExpense},
  diary::{DiaryEntry, NewDiaryEntry},
  event::{Event, EventId, NewEvent, UserId},
  user::{User, UserUpsert},
};

/// Outcome of a create or update that the store re-validates atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
  Written(T),
  /// Inside the write transaction the range was found to overlap an event
  /// of one of the involved users; nothing was written.
  Overlap,
}

/// Abstraction over a Datebook storage backend.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime (e.g. behind `axum`).
pub trait CalendarStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Events ────────────────────────────────────────────────────────────

  /// Persist a new event with `reminder_sent = false`.
  ///
  /// Implementations that can serialize writes must re-check overlap for
  /// `input.involved_users()` within the write and answer
  /// [`Guarded::Overlap`] instead of writing.
  fn create_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Guarded<Event>, Self::Error>> + Send + '_;

  /// Replace title, time range and participants of an event and reset its
  /// reminder flag. Returns `None` if the event does not exist.
  ///
  /// The overlap re-check excludes the event itself.
  fn update_event(
    &self,
    id: EventId,
    input: NewEvent,
  ) -> impl Future<Output = Result<Option<Guarded<Event>>, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: EventId,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Hard-delete an event and its participant rows. Returns `false` if it
  /// did not exist.
  fn delete_event(
    &self,
    id: EventId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Events `user` owns or is a resolved participant of, ordered by start
  /// ascending (ties broken by id).
  fn list_events_for_user(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Events involving `user` whose range overlaps `[start, end)`:
  /// `existing.start < end AND existing.end > start`.
  fn list_overlapping(
    &self,
    user: UserId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<EventId>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  // ── Reminders ─────────────────────────────────────────────────────────

  /// Atomically flip `reminder_sent` from false to true for up to `limit`
  /// events starting within `[now, now + lead]`, earliest first, and return
  /// exactly the events this call transitioned.
  ///
  /// Concurrent callers, including other processes sharing the store, never
  /// receive the same event. An empty result is normal.
  fn claim_due_reminders(
    &self,
    now: DateTime<Utc>,
    lead: Duration,
    limit: usize,
    worker: Uuid,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert or update a user. A tag already held by another user is moved
  /// to this one.
  fn upsert_user(
    &self,
    input: UserUpsert,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Users whose tag equals `alias`, or failing that whose name equals it
  /// case-insensitively. `alias` is already canonical (see
  /// [`crate::user::normalize_tag`]).
  fn find_users_by_alias<'a>(
    &'a self,
    alias: &'a str,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Store a timezone preference, creating the user if needed. The name is
  /// validated by the caller.
  fn set_timezone(
    &self,
    id: UserId,
    timezone: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  // ── Diary ─────────────────────────────────────────────────────────────

  fn append_diary_entry(
    &self,
    input: NewDiaryEntry,
  ) -> impl Future<Output = Result<DiaryEntry, Self::Error>> + Send + '_;

  /// A user's entries, newest first.
  fn list_diary_entries(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<DiaryEntry>, Self::Error>> + Send + '_;

  // ── Budget ────────────────────────────────────────────────────────────

  /// Input is already validated.
  fn add_contribution(
    &self,
    input: NewContribution,
  ) -> impl Future<Output = Result<Contribution, Self::Error>> + Send + '_;

  fn add_expense(
    &self,
    input: NewExpense,
  ) -> impl Future<Output = Result<Expense, Self::Error>> + Send + '_;

  /// At most `limit` expenses, optionally of one user, newest `spent_at`
  /// first (ties by id, newest first).
  fn list_expenses(
    &self,
    user: Option<UserId>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Expense>, Self::Error>> + Send + '_;

  /// Contributions and expenses summed per user, and expenses per category.
  fn budget_totals(&self) -> impl Future<Output = Result<BudgetTotals, Self::Error>> + Send + '_;

  /// Sum of expenses with `start <= spent_at < end`.
  fn spent_between(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> impl Future<Output = Result<Amount, Self::Error>> + Send + '_;

  fn get_daily_limit(&self) -> impl Future<Output = Result<DailyLimit, Self::Error>> + Send + '_;

  /// Replace the daily limit (`None` removes it), recording who changed it.
  fn set_daily_limit(
    &self,
    limit: Option<Amount>,
    actor: UserId,
  ) -> impl Future<Output = Result<DailyLimit, Self::Error>> + Send + '_;
}
