//! Events and their participants.
//!
//! An event is a time range in UTC owned by one user, with an ordered list of
//! participants. A participant is either a user identity known to the system
//! or a free-text label kept only for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-platform user identity (a Telegram user id in practice).
pub type UserId = i64;

/// Store-assigned event identifier.
pub type EventId = i64;

/// Upper bound on title length, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

// ─── Participant ─────────────────────────────────────────────────────────────

/// One entry of an event's participant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Participant {
  /// A resolved identity. Checked for conflicts and notified directly.
  User { user_id: UserId },
  /// Display text for someone the system cannot address. Never checked for
  /// conflicts and never notified.
  Label { label: String },
}

impl Participant {
  pub fn user_id(&self) -> Option<UserId> {
    match self {
      Self::User { user_id } => Some(*user_id),
      Self::Label { .. } => None,
    }
  }
}

/// Deduplicate a participant list in place, keeping first occurrences.
///
/// Labels compare case-insensitively. The owner is removed: they are
/// involved in their own event by ownership, not by participation.
pub fn normalize_participants(owner_id: UserId, participants: &mut Vec<Participant>) {
  let mut seen_users = Vec::new();
  let mut seen_labels: Vec<String> = Vec::new();

  participants.retain(|p| match p {
    Participant::User { user_id } => {
      if *user_id == owner_id || seen_users.contains(user_id) {
        return false;
      }
      seen_users.push(*user_id);
      true
    }
    Participant::Label { label } => {
      let key = label.trim().to_lowercase();
      if key.is_empty() || seen_labels.contains(&key) {
        return false;
      }
      seen_labels.push(key);
      true
    }
  });
}

// ─── Event ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:      EventId,
  pub owner_id:      UserId,
  pub title:         String,
  pub start_at:      DateTime<Utc>,
  /// Always later than `start_at`.
  pub end_at:        DateTime<Utc>,
  pub participants:  Vec<Participant>,
  /// Set by the reminder claim; reset when the event is updated.
  pub reminder_sent: bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Event {
  /// Resolved participant identities, in list order.
  pub fn participant_ids(&self) -> impl Iterator<Item = UserId> + '_ {
    self.participants.iter().filter_map(Participant::user_id)
  }

  /// Owner first, then resolved participants, without duplicates.
  pub fn involved_users(&self) -> Vec<UserId> {
    involved_users(self.owner_id, &self.participants)
  }
}

pub(crate) fn involved_users(owner_id: UserId, participants: &[Participant]) -> Vec<UserId> {
  let mut users = vec![owner_id];
  for id in participants.iter().filter_map(Participant::user_id) {
    if !users.contains(&id) {
      users.push(id);
    }
  }
  users
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::create_event`] and the full
/// replacement written by [`crate::store::CalendarStore::update_event`].
///
/// Timestamps (`created_at`, `updated_at`) and the reminder flag are owned by
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
  pub owner_id:     UserId,
  pub title:        String,
  pub start_at:     DateTime<Utc>,
  pub end_at:       DateTime<Utc>,
  pub participants: Vec<Participant>,
}

impl NewEvent {
  pub fn involved_users(&self) -> Vec<UserId> {
    involved_users(self.owner_id, &self.participants)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(id: UserId) -> Participant { Participant::User { user_id: id } }

  fn label(text: &str) -> Participant {
    Participant::Label { label: text.to_owned() }
  }

  #[test]
  fn normalize_drops_owner_and_duplicates() {
    let mut list = vec![
      user(2),
      label("bob"),
      user(1),
      user(2),
      label("Bob"),
      label("  "),
      user(3),
    ];
    normalize_participants(1, &mut list);
    assert_eq!(list, vec![user(2), label("bob"), user(3)]);
  }

  #[test]
  fn involved_users_skips_labels() {
    let involved = involved_users(1, &[label("bob"), user(5), user(1), user(5)]);
    assert_eq!(involved, vec![1, 5]);
  }

  #[test]
  fn participant_serializes_as_tagged_variant() {
    let json = serde_json::to_value(user(7)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "user", "user_id": 7 }));
    let json = serde_json::to_value(label("bob")).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "label", "label": "bob" }));
  }
}
