//! The event command orchestrator.
//!
//! Create and update run the same pipeline:
//!
//! 1. validate the title,
//! 2. resolve participant tokens,
//! 3. pick the timezone (request, else owner preference, else default) and
//!    convert the local times to UTC,
//! 4. reject `start >= end` and starts before now,
//! 5. check conflicts for the owner and every resolved participant,
//! 6. persist (the single mutation of the request),
//! 7. notify.
//!
//! Steps 1–5 only read. If any fails, nothing is written and nobody is
//! notified; if persistence fails, nobody is notified either. Nothing after
//! step 6 can fail: once the event is stored the request succeeds.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  clock::Clock,
  conflict::{self, Conflict},
  diary::{DiaryEntry, MAX_DIARY_CHARS, NewDiaryEntry},
  event::{Event, EventId, MAX_TITLE_CHARS, NewEvent, UserId},
  notify::{DeliveryReport, Dispatcher, Notifier},
  participant::{self, Resolution},
  store::{CalendarStore, Guarded},
  timezone,
  user::{
    TimezoneSetting, User, UserUpsert, effective_timezone, is_placeholder_name, normalize_tag,
  },
};

// ─── Requests ────────────────────────────────────────────────────────────────

/// A create request as typed by the user: wall-clock times in their zone.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
  pub owner_id:     UserId,
  pub title:        String,
  /// `YYYY-MM-DD HH:MM`
  pub start_local:  String,
  pub end_local:    String,
  /// IANA zone of the two local times. Defaults to the owner's preference.
  pub timezone:     Option<String>,
  /// Numeric ids, `@tags` or names.
  #[serde(default)]
  pub participants: Vec<String>,
}

/// A full replacement of an event's title, time range and participants.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEvent {
  pub actor_id:     UserId,
  pub title:        String,
  pub start_local:  String,
  pub end_local:    String,
  pub timezone:     Option<String>,
  #[serde(default)]
  pub participants: Vec<String>,
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// An event with its range rendered for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
  #[serde(flatten)]
  pub event:       Event,
  pub timezone:    String,
  pub start_local: String,
  pub end_local:   String,
}

/// The stored event plus what happened to its notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scheduled {
  pub event:    EventView,
  pub delivery: DeliveryReport,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct EventService<S, N> {
  store:            Arc<S>,
  dispatcher:       Arc<Dispatcher<S, N>>,
  clock:            Arc<dyn Clock>,
  default_timezone: String,
}

impl<S, N> EventService<S, N>
where
  S: CalendarStore,
  N: Notifier,
{
  /// `default_timezone` must be a valid IANA name.
  pub fn new(
    store: Arc<S>,
    dispatcher: Arc<Dispatcher<S, N>>,
    clock: Arc<dyn Clock>,
    default_timezone: impl Into<String>,
  ) -> Result<Self> {
    let default_timezone = default_timezone.into();
    timezone::parse_timezone(&default_timezone)?;
    Ok(Self { store, dispatcher, clock, default_timezone })
  }

  // ── Events ────────────────────────────────────────────────────────────

  pub async fn create_event(&self, req: CreateEvent) -> Result<Scheduled> {
    let Prepared { input, zone } = self
      .prepare(
        req.owner_id,
        &req.title,
        &req.start_local,
        &req.end_local,
        req.timezone.as_deref(),
        &req.participants,
      )
      .await?;

    self.ensure_free(&input, None).await?;

    let event = match self.store.create_event(input.clone()).await.map_err(Error::store)? {
      Guarded::Written(event) => event,
      Guarded::Overlap => return Err(self.overlap_error(&input, None).await),
    };
    info!(event_id = event.event_id, owner_id = event.owner_id, "event created");

    let delivery = self.dispatcher.notify_created(&event).await;
    Ok(Scheduled { event: render_view(event, zone), delivery })
  }

  pub async fn update_event(&self, id: EventId, req: UpdateEvent) -> Result<Scheduled> {
    self.owned_event(id, req.actor_id).await?;

    let Prepared { input, zone } = self
      .prepare(
        req.actor_id,
        &req.title,
        &req.start_local,
        &req.end_local,
        req.timezone.as_deref(),
        &req.participants,
      )
      .await?;

    self.ensure_free(&input, Some(id)).await?;

    let event = match self
      .store
      .update_event(id, input.clone())
      .await
      .map_err(Error::store)?
    {
      Some(Guarded::Written(event)) => event,
      Some(Guarded::Overlap) => return Err(self.overlap_error(&input, Some(id)).await),
      None => return Err(Error::EventNotFound(id)),
    };
    info!(event_id = event.event_id, owner_id = event.owner_id, "event updated");

    let delivery = self.dispatcher.notify_updated(&event).await;
    Ok(Scheduled { event: render_view(event, zone), delivery })
  }

  /// Delete an event owned by `actor_id`. Unknown ids and events owned by
  /// someone else are both reported as not found.
  pub async fn delete_event(&self, id: EventId, actor_id: UserId) -> Result<DeliveryReport> {
    let event = self.owned_event(id, actor_id).await?;

    if !self.store.delete_event(id).await.map_err(Error::store)? {
      return Err(Error::EventNotFound(id));
    }
    info!(event_id = id, owner_id = actor_id, "event deleted");

    Ok(self.dispatcher.notify_deleted(&event).await)
  }

  /// Events `user` owns or participates in, rendered in their timezone.
  pub async fn list_events(&self, user: UserId) -> Result<Vec<EventView>> {
    let tz = timezone::parse_timezone(&self.timezone_of(user).await?.timezone)?;
    let events = self
      .store
      .list_events_for_user(user)
      .await
      .map_err(Error::store)?;
    Ok(events.into_iter().map(|e| render_view(e, tz)).collect())
  }

  // ── Timezones ─────────────────────────────────────────────────────────

  pub async fn timezone_of(&self, user: UserId) -> Result<TimezoneSetting> {
    effective_timezone(self.store.as_ref(), user, &self.default_timezone).await
  }

  pub async fn set_timezone(&self, user: UserId, name: &str) -> Result<TimezoneSetting> {
    let tz = timezone::parse_timezone(name)?;
    let stored = self
      .store
      .set_timezone(user, tz.name().to_owned())
      .await
      .map_err(Error::store)?;
    info!(user_id = user, timezone = tz.name(), "timezone set");
    Ok(TimezoneSetting {
      user_id:    stored.user_id,
      timezone:   tz.name().to_owned(),
      is_default: false,
    })
  }

  // ── Users ─────────────────────────────────────────────────────────────

  /// Record that a user was seen, refreshing their name and alias.
  pub async fn observe_user(&self, input: UserUpsert) -> Result<User> {
    let input = UserUpsert {
      user_id: input.user_id,
      name:    input.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
      tag:     input.tag.as_deref().and_then(normalize_tag),
    };
    self.store.upsert_user(input).await.map_err(Error::store)
  }

  /// Preview how each label would resolve as a participant.
  pub async fn resolve_labels(&self, labels: &[String]) -> Result<Vec<Resolution>> {
    let mut out = Vec::with_capacity(labels.len());
    for token in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
      out.push(Resolution {
        token:       token.to_owned(),
        participant: participant::resolve(self.store.as_ref(), token).await?,
      });
    }
    Ok(out)
  }

  // ── Diary ─────────────────────────────────────────────────────────────

  /// Append a diary entry. The author is observed as a side effect, which
  /// is what makes their `@tag` resolvable as a participant later on. The
  /// chat username only becomes the display name while none is known.
  pub async fn append_diary_entry(&self, input: NewDiaryEntry) -> Result<DiaryEntry> {
    let chars = input.text.chars().count();
    if input.text.trim().is_empty() || chars > MAX_DIARY_CHARS {
      return Err(Error::InvalidDiaryText(MAX_DIARY_CHARS));
    }

    let named = self
      .store
      .get_user(input.user_id)
      .await
      .map_err(Error::store)?
      .is_some_and(|u| !is_placeholder_name(&u));
    self
      .observe_user(UserUpsert {
        user_id: input.user_id,
        name:    if named { None } else { input.username.clone() },
        tag:     input.username.clone(),
      })
      .await?;

    let entry = self
      .store
      .append_diary_entry(input)
      .await
      .map_err(Error::store)?;
    info!(entry_id = entry.entry_id, user_id = entry.user_id, "diary entry saved");
    Ok(entry)
  }

  pub async fn list_diary_entries(&self, user: UserId) -> Result<Vec<DiaryEntry>> {
    self.store.list_diary_entries(user).await.map_err(Error::store)
  }

  // ── Pipeline steps ────────────────────────────────────────────────────

  async fn prepare(
    &self,
    owner_id: UserId,
    title: &str,
    start_local: &str,
    end_local: &str,
    zone: Option<&str>,
    tokens: &[String],
  ) -> Result<Prepared> {
    let title = title.trim();
    if title.is_empty() {
      return Err(Error::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_CHARS {
      return Err(Error::TitleTooLong(MAX_TITLE_CHARS));
    }

    let participants =
      participant::resolve_all(self.store.as_ref(), owner_id, tokens).await?;

    let zone = match zone.map(str::trim).filter(|z| !z.is_empty()) {
      Some(z) => timezone::parse_timezone(z)?,
      None => timezone::parse_timezone(&self.timezone_of(owner_id).await?.timezone)?,
    };

    let start_at = timezone::to_utc(timezone::parse_local(start_local)?, zone.name())?;
    let end_at = timezone::to_utc(timezone::parse_local(end_local)?, zone.name())?;

    if start_at >= end_at {
      return Err(Error::InvalidRange);
    }
    if start_at < self.clock.now() {
      return Err(Error::StartInPast);
    }

    let input = NewEvent {
      owner_id,
      title: title.to_owned(),
      start_at,
      end_at,
      participants,
    };
    Ok(Prepared { input, zone })
  }

  async fn conflicts_for(
    &self,
    input: &NewEvent,
    exclude: Option<EventId>,
  ) -> Result<Vec<Conflict>> {
    conflict::check(
      self.store.as_ref(),
      &input.involved_users(),
      input.start_at,
      input.end_at,
      exclude,
    )
    .await
  }

  async fn ensure_free(&self, input: &NewEvent, exclude: Option<EventId>) -> Result<()> {
    let conflicts = self.conflicts_for(input, exclude).await?;
    if conflicts.is_empty() {
      Ok(())
    } else {
      info!(owner_id = input.owner_id, conflicts = conflicts.len(), "event rejected: conflict");
      Err(Error::Conflict(conflicts))
    }
  }

  /// The store refused a write that passed the read-only check: another
  /// request got there first. Report what is in the way now.
  async fn overlap_error(&self, input: &NewEvent, exclude: Option<EventId>) -> Error {
    info!(owner_id = input.owner_id, "event rejected: concurrent overlapping write");
    match self.conflicts_for(input, exclude).await {
      Ok(conflicts) => Error::Conflict(conflicts),
      Err(e) => e,
    }
  }

  async fn owned_event(&self, id: EventId, actor_id: UserId) -> Result<Event> {
    let event = self
      .store
      .get_event(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::EventNotFound(id))?;
    if event.owner_id != actor_id {
      info!(event_id = id, actor_id, "rejected change by non-owner");
      return Err(Error::EventNotFound(id));
    }
    Ok(event)
  }
}

/// A validated event plus the zone its local times were given in.
struct Prepared {
  input: NewEvent,
  zone:  Tz,
}

fn render_view(event: Event, tz: Tz) -> EventView {
  EventView {
    start_local: timezone::render_in(event.start_at, tz),
    end_local:   timezone::render_in(event.end_at, tz),
    timezone:    tz.name().to_owned(),
    event,
  }
}
