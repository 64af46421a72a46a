//! Diary entries: plain text a user sent to the bot, kept as-is.
//!
//! Entries are append-only and take no part in scheduling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::UserId;

/// Upper bound on entry length (a single chat message).
pub const MAX_DIARY_CHARS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
  pub entry_id:   i64,
  pub user_id:    UserId,
  pub username:   Option<String>,
  /// Chat and message the entry came from.
  pub chat_id:    i64,
  pub message_id: i64,
  pub text:       String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewDiaryEntry {
  pub user_id:    UserId,
  pub username:   Option<String>,
  pub chat_id:    i64,
  pub message_id: i64,
  pub text:       String,
}
