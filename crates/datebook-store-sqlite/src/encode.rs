//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! millisecond precision, so lexical comparison in SQL matches temporal
//! order. Identifiers are SQLite integers.

use chrono::{DateTime, SecondsFormat, Utc};
use datebook_core::{
  budget::{Contribution, DailyLimit, Expense},
  diary::DiaryEntry,
  event::{Event, Participant},
  user::User,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Participant ─────────────────────────────────────────────────────────────

/// Column values for one `event_participants` row.
pub fn encode_participant(p: &Participant) -> (Option<i64>, Option<String>) {
  match p {
    Participant::User { user_id } => (Some(*user_id), None),
    Participant::Label { label } => (None, Some(label.clone())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from an `event_participants` row.
pub struct RawParticipant {
  pub user_id: Option<i64>,
  pub label:   Option<String>,
}

/// Raw values read from an `events` row plus its participant rows.
pub struct RawEvent {
  pub event_id:      i64,
  pub owner_id:      i64,
  pub title:         String,
  pub start_at:      String,
  pub end_at:        String,
  pub reminder_sent: bool,
  pub created_at:    String,
  pub updated_at:    String,
  pub participants:  Vec<RawParticipant>,
}

impl RawEvent {
  pub fn into_event(self) -> Result<Event> {
    let participants = self
      .participants
      .into_iter()
      .map(|p| match (p.user_id, p.label) {
        (Some(user_id), None) => Ok(Participant::User { user_id }),
        (None, Some(label)) => Ok(Participant::Label { label }),
        _ => Err(Error::MalformedParticipant(self.event_id)),
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Event {
      event_id: self.event_id,
      owner_id: self.owner_id,
      title: self.title,
      start_at: decode_dt(&self.start_at)?,
      end_at: decode_dt(&self.end_at)?,
      participants,
      reminder_sent: self.reminder_sent,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `users` row.
pub struct RawUser {
  pub user_id:    i64,
  pub name:       String,
  pub tag:        Option<String>,
  pub timezone:   Option<String>,
  pub updated_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    self.user_id,
      name:       self.name,
      tag:        self.tag,
      timezone:   self.timezone,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `diary_entries` row.
pub struct RawDiaryEntry {
  pub entry_id:   i64,
  pub user_id:    i64,
  pub username:   Option<String>,
  pub chat_id:    i64,
  pub message_id: i64,
  pub text:       String,
  pub created_at: String,
}

impl RawDiaryEntry {
  pub fn into_entry(self) -> Result<DiaryEntry> {
    Ok(DiaryEntry {
      entry_id:   self.entry_id,
      user_id:    self.user_id,
      username:   self.username,
      chat_id:    self.chat_id,
      message_id: self.message_id,
      text:       self.text,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `budget_contributions` row.
pub struct RawContribution {
  pub contribution_id: i64,
  pub user_id:         i64,
  pub amount:          i64,
  pub comment:         Option<String>,
  pub created_at:      String,
}

impl RawContribution {
  pub fn into_contribution(self) -> Result<Contribution> {
    Ok(Contribution {
      contribution_id: self.contribution_id,
      user_id:         self.user_id,
      amount:          self.amount,
      comment:         self.comment,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from an `expenses` row.
pub struct RawExpense {
  pub expense_id: i64,
  pub user_id:    i64,
  pub amount:     i64,
  pub category:   String,
  pub spent_at:   String,
  pub comment:    Option<String>,
  pub created_at: String,
}

impl RawExpense {
  pub fn into_expense(self) -> Result<Expense> {
    Ok(Expense {
      expense_id: self.expense_id,
      user_id:    self.user_id,
      amount:     self.amount,
      category:   self.category,
      spent_at:   decode_dt(&self.spent_at)?,
      comment:    self.comment,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from the `budget_settings` row.
pub struct RawDailyLimit {
  pub daily_limit: Option<i64>,
  pub updated_by:  Option<i64>,
  pub updated_at:  Option<String>,
}

impl RawDailyLimit {
  pub fn into_daily_limit(self) -> Result<DailyLimit> {
    Ok(DailyLimit {
      daily_limit: self.daily_limit,
      updated_by:  self.updated_by,
      updated_at:  self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_ordered() {
    let a = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(500);
    let c = a + chrono::Duration::milliseconds(1500);

    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert_eq!(ea, "2024-01-10T08:00:00.000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb && eb < ec);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn malformed_participant_row_is_an_error() {
    let raw = RawEvent {
      event_id:      1,
      owner_id:      1,
      title:         "x".into(),
      start_at:      "2024-01-10T08:00:00.000Z".into(),
      end_at:        "2024-01-10T09:00:00.000Z".into(),
      reminder_sent: false,
      created_at:    "2024-01-01T00:00:00.000Z".into(),
      updated_at:    "2024-01-01T00:00:00.000Z".into(),
      participants:  vec![RawParticipant { user_id: None, label: None }],
    };
    assert!(matches!(raw.into_event(), Err(Error::MalformedParticipant(1))));
  }
}
