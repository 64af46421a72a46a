//! Conflict detection: does a candidate range overlap any existing event of
//! an involved user?

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  event::{Event, EventId, UserId},
  store::CalendarStore,
};

/// An existing event that overlaps the candidate, and the involved users
/// whose calendars it blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
  pub event_id: EventId,
  pub title:    String,
  pub start_at: DateTime<Utc>,
  pub end_at:   DateTime<Utc>,
  /// Sorted ascending.
  pub user_ids: Vec<UserId>,
}

/// Fold per-user overlap results into one conflict per event.
///
/// Input pairs are `(user the event was found for, event)`. Output is
/// ordered by start, then id.
pub fn merge(found: impl IntoIterator<Item = (UserId, Event)>) -> Vec<Conflict> {
  let mut conflicts: Vec<Conflict> = Vec::new();

  for (user_id, event) in found {
    match conflicts.iter_mut().find(|c| c.event_id == event.event_id) {
      Some(existing) => {
        if !existing.user_ids.contains(&user_id) {
          existing.user_ids.push(user_id);
        }
      }
      None => conflicts.push(Conflict {
        event_id: event.event_id,
        title:    event.title,
        start_at: event.start_at,
        end_at:   event.end_at,
        user_ids: vec![user_id],
      }),
    }
  }

  for c in &mut conflicts {
    c.user_ids.sort_unstable();
  }
  conflicts.sort_by(|a, b| {
    a.start_at.cmp(&b.start_at).then(a.event_id.cmp(&b.event_id))
  });
  conflicts
}

/// Find every overlap between `[start, end)` and the calendars of `owner`
/// and each resolved participant.
///
/// Labels never reach this function: only identities known to the system
/// have calendars to check. `exclude` is the event being updated.
pub async fn check<S>(
  store: &S,
  users: &[UserId],
  start: DateTime<Utc>,
  end: DateTime<Utc>,
  exclude: Option<EventId>,
) -> Result<Vec<Conflict>>
where
  S: CalendarStore,
{
  let mut found = Vec::new();
  for &user in users {
    let events = store
      .list_overlapping(user, start, end, exclude)
      .await
      .map_err(Error::store)?;
    found.extend(events.into_iter().map(|e| (user, e)));
  }
  Ok(merge(found))
}
