//! Turning free-text participant tokens into identities.
//!
//! A token is a numeric user id, an `@tag`, or a display name. Numeric ids
//! resolve without a lookup. Aliases resolve only through mappings the store
//! has observed (users who talked to the bot); anything else is kept as a
//! [`Participant::Label`].

use serde::Serialize;
use tracing::debug;

use crate::{
  Error, Result,
  event::{Participant, UserId, normalize_participants},
  store::CalendarStore,
  user::normalize_tag,
};

/// Split a comma-separated participant list. `-` or blank input means none.
pub fn split_tokens(raw: &str) -> Vec<String> {
  let raw = raw.trim();
  if raw.is_empty() || raw == "-" {
    return Vec::new();
  }
  raw
    .split(',')
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
    .collect()
}

/// A strictly positive integer token is an identity in its own right.
fn numeric_identity(token: &str) -> Option<UserId> {
  if !token.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  token.parse::<UserId>().ok().filter(|id| *id > 0)
}

/// Resolve one token.
pub async fn resolve<S>(store: &S, token: &str) -> Result<Participant>
where
  S: CalendarStore,
{
  let token = token.trim();
  if let Some(user_id) = numeric_identity(token) {
    return Ok(Participant::User { user_id });
  }

  let Some(alias) = normalize_tag(token) else {
    return Ok(Participant::Label { label: token.to_owned() });
  };

  let matches = store
    .find_users_by_alias(&alias)
    .await
    .map_err(Error::store)?;

  match matches.as_slice() {
    [user] => Ok(Participant::User { user_id: user.user_id }),
    [] => Ok(Participant::Label { label: token.to_owned() }),
    many => {
      debug!(alias = %alias, candidates = many.len(), "ambiguous participant alias");
      Ok(Participant::Label { label: token.to_owned() })
    }
  }
}

/// Resolve every token and normalise the result for `owner_id`.
pub async fn resolve_all<S>(
  store: &S,
  owner_id: UserId,
  tokens: &[String],
) -> Result<Vec<Participant>>
where
  S: CalendarStore,
{
  let mut participants = Vec::with_capacity(tokens.len());
  for token in tokens {
    if token.trim().is_empty() {
      continue;
    }
    participants.push(resolve(store, token).await?);
  }
  normalize_participants(owner_id, &mut participants);
  Ok(participants)
}

/// Result of resolving a single label, as shown by the resolve preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
  pub token:       String,
  pub participant: Participant,
}
