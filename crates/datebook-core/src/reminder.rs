//! Reminder claiming and delivery.
//!
//! Per event: `Created → Due & unclaimed → Claimed/Sent`. The claim is a
//! single conditional update in the store that sets `reminder_sent` before
//! any send is attempted. A crash or send failure after the claim loses that
//! reminder; it is logged and never retried, so no event is ever reminded
//! twice, even with several schedulers polling one store.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  clock::Clock,
  event::EventId,
  notify::{DeliveryReport, Dispatcher, Notifier},
  store::CalendarStore,
};

/// Defaults used when the configuration does not say otherwise.
pub const DEFAULT_LEAD: Duration = Duration::minutes(10);
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// What happened to one claimed reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderOutcome {
  pub event_id: EventId,
  pub report:   DeliveryReport,
}

/// Summary of one [`ReminderScheduler::run_once`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderPass {
  pub worker:   Uuid,
  pub claimed:  usize,
  pub outcomes: Vec<ReminderOutcome>,
}

impl ReminderPass {
  /// Claimed reminders whose delivery failed. They stay marked as sent.
  pub fn lost(&self) -> usize {
    self.outcomes.iter().filter(|o| !o.report.is_complete()).count()
  }
}

pub struct ReminderScheduler<S, N> {
  store:      Arc<S>,
  dispatcher: Arc<Dispatcher<S, N>>,
  clock:      Arc<dyn Clock>,
  lead:       Duration,
  batch_size: usize,
  /// Identifies this scheduler in claim records and logs.
  worker:     Uuid,
}

impl<S, N> ReminderScheduler<S, N>
where
  S: CalendarStore,
  N: Notifier,
{
  pub fn new(
    store: Arc<S>,
    dispatcher: Arc<Dispatcher<S, N>>,
    clock: Arc<dyn Clock>,
    lead: Duration,
    batch_size: usize,
  ) -> Self {
    Self {
      store,
      dispatcher,
      clock,
      lead,
      batch_size: batch_size.max(1),
      worker: Uuid::new_v4(),
    }
  }

  pub fn worker(&self) -> Uuid { self.worker }

  /// Claim every due reminder (in batches) and dispatch each one.
  pub async fn run_once(&self) -> Result<ReminderPass> {
    let mut pass = ReminderPass { worker: self.worker, ..Default::default() };

    loop {
      let now = self.clock.now();
      let claimed = self
        .store
        .claim_due_reminders(now, self.lead, self.batch_size, self.worker)
        .await
        .map_err(Error::store)?;

      if claimed.is_empty() {
        break;
      }
      let full_batch = claimed.len() >= self.batch_size;
      pass.claimed += claimed.len();

      for event in claimed {
        info!(worker = %self.worker, event_id = event.event_id, start_at = %event.start_at, "reminder claimed");
        let report = self.dispatcher.notify_reminder(&event).await;
        if !report.is_complete() {
          warn!(
            worker = %self.worker,
            event_id = event.event_id,
            "reminder lost: claimed but not delivered"
          );
        }
        pass.outcomes.push(ReminderOutcome { event_id: event.event_id, report });
      }

      if !full_batch {
        break;
      }
    }

    if pass.claimed == 0 {
      debug!(worker = %self.worker, "no reminders due");
    }
    Ok(pass)
  }
}
