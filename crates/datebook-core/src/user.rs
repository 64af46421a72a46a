//! Users as observed through the chat platform, and their preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, event::UserId, store::CalendarStore, timezone};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    UserId,
  /// Display name; falls back to the numeric id when nothing better is known.
  pub name:       String,
  /// Lowercased alias without the leading `@`. Unique across users.
  pub tag:        Option<String>,
  /// IANA zone name. `None` means the process default applies.
  pub timezone:   Option<String>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::CalendarStore::upsert_user`].
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpsert {
  pub user_id: UserId,
  pub name:    Option<String>,
  pub tag:     Option<String>,
}

/// Canonical form of a tag: trimmed, `@` stripped, lowercased.
/// Returns `None` for blank input.
pub fn normalize_tag(raw: &str) -> Option<String> {
  let tag = raw.trim().trim_start_matches('@').trim().to_lowercase();
  (!tag.is_empty()).then_some(tag)
}

/// A user's effective timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimezoneSetting {
  pub user_id:    UserId,
  pub timezone:   String,
  /// `true` when the user has not chosen a zone and the default applies.
  pub is_default: bool,
}

/// A user's stored zone, or `default` when none is set or the stored name
/// no longer parses.
pub async fn effective_timezone<S: CalendarStore>(
  store: &S,
  user: UserId,
  default: &str,
) -> Result<TimezoneSetting> {
  let stored = store
    .get_user(user)
    .await
    .map_err(Error::store)?
    .and_then(|u| u.timezone)
    .filter(|tz| timezone::parse_timezone(tz).is_ok());

  Ok(match stored {
    Some(timezone) => TimezoneSetting { user_id: user, timezone, is_default: false },
    None => TimezoneSetting {
      user_id:    user,
      timezone:   default.to_owned(),
      is_default: true,
    },
  })
}

/// Whether the user's name is still the numeric-id placeholder.
pub fn is_placeholder_name(user: &User) -> bool {
  user.name == user.user_id.to_string()
}
