//! Error types for `datebook-core`.

use thiserror::Error;

use crate::{conflict::Conflict, event::EventId};

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("unknown timezone: {0:?}")]
  InvalidTimezone(String),

  #[error("invalid time {0:?}, expected YYYY-MM-DD HH:MM")]
  InvalidTimeFormat(String),

  /// The wall-clock time falls into a DST gap and never happens in the zone.
  #[error("local time {local} does not exist in {timezone}")]
  InvalidLocalTime { local: String, timezone: String },

  #[error("end time must be later than start time")]
  InvalidRange,

  #[error("event cannot start in the past")]
  StartInPast,

  #[error("event title must not be empty")]
  EmptyTitle,

  #[error("event title is longer than {0} characters")]
  TitleTooLong(usize),

  #[error("diary text must be between 1 and {0} characters")]
  InvalidDiaryText(usize),

  #[error("amount must be a whole number between 1 and {0}")]
  InvalidAmount(i64),

  #[error("category must be between 1 and {0} characters")]
  InvalidCategory(usize),

  #[error("comment is longer than {0} characters")]
  CommentTooLong(usize),

  // ── Domain ──────────────────────────────────────────────────────────────
  #[error("event overlaps {} existing event(s)", .0.len())]
  Conflict(Vec<Conflict>),

  /// Unknown event id, or the actor does not own the event.
  #[error("event not found: {0}")]
  EventNotFound(EventId),

  // ── Infrastructure ──────────────────────────────────────────────────────
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Whether the error was caused by caller input rather than the system.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::InvalidTimezone(_)
        | Self::InvalidTimeFormat(_)
        | Self::InvalidLocalTime { .. }
        | Self::InvalidRange
        | Self::StartInPast
        | Self::EmptyTitle
        | Self::TitleTooLong(_)
        | Self::InvalidDiaryText(_)
        | Self::InvalidAmount(_)
        | Self::InvalidCategory(_)
        | Self::CommentTooLong(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
