//! Outbound notifications: who hears about an event, and what they read.
//!
//! Delivery is per recipient and best-effort. A failed send is logged and
//! recorded in the [`DeliveryReport`]; it never fails the request or the
//! reminder pass that triggered it, and it is never retried.

use std::{future::Future, sync::Arc};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  event::{Event, Participant, UserId},
  store::CalendarStore,
  timezone,
};

// ─── Notifier ────────────────────────────────────────────────────────────────

/// The message-send capability of the chat platform.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    recipient: UserId,
    text: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
  pub user_id: UserId,
  pub error:   String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
  pub delivered: Vec<UserId>,
  pub failed:    Vec<DeliveryFailure>,
}

impl DeliveryReport {
  pub fn is_complete(&self) -> bool { self.failed.is_empty() }

  fn merge(&mut self, other: DeliveryReport) {
    self.delivered.extend(other.delivered);
    self.failed.extend(other.failed);
  }
}

// ─── Message kinds ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
  Created,
  Updated,
  Deleted,
  Reminder,
}

impl Notice {
  fn as_str(self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Updated => "updated",
      Self::Deleted => "deleted",
      Self::Reminder => "reminder",
    }
  }
}

/// Everything needed to render a notice for one recipient.
struct NoticeContext<'a> {
  event:        &'a Event,
  creator:      &'a str,
  participants: &'a [String],
  timezone:     &'a str,
}

fn time_range(ctx: &NoticeContext<'_>) -> String {
  let start = timezone::render(ctx.event.start_at, ctx.timezone);
  let end = timezone::render(ctx.event.end_at, ctx.timezone);
  match (start, end) {
    (Ok(start), Ok(end)) => format!("{start} - {end} ({})", ctx.timezone),
    _ => format!(
      "{} - {} (UTC)",
      timezone::format_local(ctx.event.start_at.naive_utc()),
      timezone::format_local(ctx.event.end_at.naive_utc()),
    ),
  }
}

fn participant_line(ctx: &NoticeContext<'_>) -> String {
  if ctx.participants.is_empty() {
    "Participants: -".to_owned()
  } else {
    format!("Participants: {}", ctx.participants.join(", "))
  }
}

fn render(notice: Notice, ctx: &NoticeContext<'_>) -> String {
  let event = ctx.event;
  match notice {
    Notice::Created => format!(
      "{} created an event: #{} {}\n{}\n{}",
      ctx.creator,
      event.event_id,
      event.title,
      time_range(ctx),
      participant_line(ctx),
    ),
    Notice::Updated => format!(
      "{} updated an event: #{} {}\n{}\n{}",
      ctx.creator,
      event.event_id,
      event.title,
      time_range(ctx),
      participant_line(ctx),
    ),
    Notice::Deleted => format!(
      "{} cancelled an event: #{} {}\n{}",
      ctx.creator,
      event.event_id,
      event.title,
      time_range(ctx),
    ),
    Notice::Reminder => format!(
      "Reminder: your event starts soon.\n#{} {}\n{}\n{}",
      event.event_id,
      event.title,
      time_range(ctx),
      participant_line(ctx),
    ),
  }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Fans notices out to recipients, rendering times in each recipient's own
/// timezone.
pub struct Dispatcher<S, N> {
  store:            Arc<S>,
  notifier:         Arc<N>,
  default_timezone: String,
}

impl<S, N> Dispatcher<S, N>
where
  S: CalendarStore,
  N: Notifier,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, default_timezone: impl Into<String>) -> Self {
    Self { store, notifier, default_timezone: default_timezone.into() }
  }

  /// Owner plus every resolved participant. Labels are named in the text
  /// but receive nothing.
  pub async fn notify_created(&self, event: &Event) -> DeliveryReport {
    self.fan_out(Notice::Created, event, &event.involved_users()).await
  }

  /// Same audience as [`Self::notify_created`].
  pub async fn notify_updated(&self, event: &Event) -> DeliveryReport {
    self.fan_out(Notice::Updated, event, &event.involved_users()).await
  }

  /// Resolved participants only; the owner initiated the deletion.
  pub async fn notify_deleted(&self, event: &Event) -> DeliveryReport {
    let recipients: Vec<UserId> = event
      .involved_users()
      .into_iter()
      .filter(|id| *id != event.owner_id)
      .collect();
    self.fan_out(Notice::Deleted, event, &recipients).await
  }

  /// The creator only.
  pub async fn notify_reminder(&self, event: &Event) -> DeliveryReport {
    self.fan_out(Notice::Reminder, event, &[event.owner_id]).await
  }

  async fn fan_out(
    &self,
    notice: Notice,
    event: &Event,
    recipients: &[UserId],
  ) -> DeliveryReport {
    let creator = self.display_name(event.owner_id).await;
    let mut participants = Vec::with_capacity(event.participants.len());
    for p in &event.participants {
      participants.push(match p {
        Participant::User { user_id } => self.display_name(*user_id).await,
        Participant::Label { label } => label.clone(),
      });
    }

    let mut report = DeliveryReport::default();
    for &recipient in recipients {
      let timezone = self.timezone_of(recipient).await;
      let ctx = NoticeContext {
        event,
        creator: &creator,
        participants: &participants,
        timezone: &timezone,
      };
      let text = render(notice, &ctx);
      report.merge(self.deliver(notice, event, recipient, &text).await);
    }
    report
  }

  async fn deliver(
    &self,
    notice: Notice,
    event: &Event,
    recipient: UserId,
    text: &str,
  ) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    match self.notifier.send(recipient, text).await {
      Ok(()) => {
        debug!(event_id = event.event_id, recipient, notice = notice.as_str(), "notification delivered");
        report.delivered.push(recipient);
      }
      Err(e) => {
        warn!(
          event_id = event.event_id,
          recipient,
          notice = notice.as_str(),
          error = %e,
          "notification delivery failed"
        );
        report.failed.push(DeliveryFailure { user_id: recipient, error: e.to_string() });
      }
    }
    report
  }

  async fn display_name(&self, user_id: UserId) -> String {
    match self.store.get_user(user_id).await {
      Ok(Some(user)) => user.name,
      Ok(None) => user_id.to_string(),
      Err(e) => {
        warn!(user_id, error = %e, "user lookup failed while rendering notice");
        user_id.to_string()
      }
    }
  }

  async fn timezone_of(&self, user_id: UserId) -> String {
    let preferred = match self.store.get_user(user_id).await {
      Ok(user) => user.and_then(|u| u.timezone),
      Err(e) => {
        warn!(user_id, error = %e, "timezone lookup failed, using default");
        None
      }
    };
    match preferred {
      Some(tz) if timezone::parse_timezone(&tz).is_ok() => tz,
      _ => self.default_timezone.clone(),
    }
  }
}
