//! [`SqliteStore`], the SQLite implementation of [`CalendarStore`].

use std::{path::Path, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use datebook_core::{
  budget::{
    Amount, BudgetTotals, CategoryTotal, Contribution, DailyLimit, Expense, NewContribution,
    NewExpense, Share,
  },
  diary::{DiaryEntry, NewDiaryEntry},
  event::{Event, EventId, NewEvent, UserId},
  store::{CalendarStore, Guarded},
  user::{User, UserUpsert, normalize_tag},
};

use crate::{
  Result,
  encode::{
    RawContribution, RawDailyLimit, RawDiaryEntry, RawEvent, RawExpense, RawParticipant, RawUser,
    encode_dt, encode_participant,
  },
  schema::SCHEMA,
};

/// How long a writer waits for another connection's lock before giving up.
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

const SELECT_EVENT: &str = "SELECT e.event_id, e.owner_id, e.title, e.start_at, e.end_at,
         e.reminder_sent, e.created_at, e.updated_at
  FROM events e";

/// `?1` is owner or a resolved participant of `e`.
const INVOLVES_USER: &str = "(e.owner_id = ?1 OR EXISTS (
    SELECT 1 FROM event_participants p
    WHERE p.event_id = e.event_id AND p.user_id = ?1))";

const SELECT_USER: &str = "SELECT user_id, name, tag, timezone, updated_at FROM users";

const SELECT_DIARY: &str = "SELECT entry_id, user_id, username, chat_id, message_id, text, created_at
  FROM diary_entries";

const SELECT_CONTRIBUTION: &str = "SELECT contribution_id, user_id, amount, comment, created_at
  FROM budget_contributions";

const SELECT_EXPENSE: &str = "SELECT expense_id, user_id, amount, category, spent_at, comment, created_at
  FROM expenses";

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run inside `Connection::call` closures, on the database thread.

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
  Ok(RawEvent {
    event_id:      row.get(0)?,
    owner_id:      row.get(1)?,
    title:         row.get(2)?,
    start_at:      row.get(3)?,
    end_at:        row.get(4)?,
    reminder_sent: row.get(5)?,
    created_at:    row.get(6)?,
    updated_at:    row.get(7)?,
    participants:  Vec::new(),
  })
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:    row.get(0)?,
    name:       row.get(1)?,
    tag:        row.get(2)?,
    timezone:   row.get(3)?,
    updated_at: row.get(4)?,
  })
}

fn diary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDiaryEntry> {
  Ok(RawDiaryEntry {
    entry_id:   row.get(0)?,
    user_id:    row.get(1)?,
    username:   row.get(2)?,
    chat_id:    row.get(3)?,
    message_id: row.get(4)?,
    text:       row.get(5)?,
    created_at: row.get(6)?,
  })
}

fn contribution_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContribution> {
  Ok(RawContribution {
    contribution_id: row.get(0)?,
    user_id:         row.get(1)?,
    amount:          row.get(2)?,
    comment:         row.get(3)?,
    created_at:      row.get(4)?,
  })
}

fn expense_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawExpense> {
  Ok(RawExpense {
    expense_id: row.get(0)?,
    user_id:    row.get(1)?,
    amount:     row.get(2)?,
    category:   row.get(3)?,
    spent_at:   row.get(4)?,
    comment:    row.get(5)?,
    created_at: row.get(6)?,
  })
}

/// Per-user sums of `amount` in `table`, largest first. Users never seen
/// are named by their id.
fn shares(conn: &Connection, table: &str) -> rusqlite::Result<Vec<Share>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT t.user_id, COALESCE(u.name, CAST(t.user_id AS TEXT)), SUM(t.amount) AS total
     FROM {table} t LEFT JOIN users u ON u.user_id = t.user_id
     GROUP BY t.user_id
     ORDER BY total DESC, t.user_id"
  ))?;
  let rows = stmt
    .query_map([], |row| {
      Ok(Share { user_id: row.get(0)?, name: row.get(1)?, amount: row.get(2)? })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_daily_limit(conn: &Connection) -> rusqlite::Result<Option<RawDailyLimit>> {
  conn
    .query_row(
      "SELECT daily_limit, updated_by, updated_at FROM budget_settings WHERE id = 1",
      [],
      |row| {
        Ok(RawDailyLimit {
          daily_limit: row.get(0)?,
          updated_by:  row.get(1)?,
          updated_at:  row.get(2)?,
        })
      },
    )
    .optional()
}

fn fill_participants(conn: &Connection, raw: &mut RawEvent) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "SELECT user_id, label FROM event_participants
     WHERE event_id = ?1 ORDER BY position",
  )?;
  raw.participants = stmt
    .query_map(rusqlite::params![raw.event_id], |row| {
      Ok(RawParticipant { user_id: row.get(0)?, label: row.get(1)? })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(())
}

fn query_events(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawEvent>> {
  let mut stmt = conn.prepare(sql)?;
  let mut raws = stmt
    .query_map(params, event_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for raw in &mut raws {
    fill_participants(conn, raw)?;
  }
  Ok(raws)
}

fn load_event(conn: &Connection, id: EventId) -> rusqlite::Result<Option<RawEvent>> {
  let sql = format!("{SELECT_EVENT} WHERE e.event_id = ?1");
  Ok(query_events(conn, &sql, rusqlite::params![id])?.pop())
}

fn load_user(conn: &Connection, id: UserId) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("{SELECT_USER} WHERE user_id = ?1"),
      rusqlite::params![id],
      user_row,
    )
    .optional()
}

fn write_participants(
  conn: &Connection,
  event_id: EventId,
  participants: &[(Option<i64>, Option<String>)],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "INSERT INTO event_participants (event_id, position, user_id, label)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (position, (user_id, label)) in participants.iter().enumerate() {
    stmt.execute(rusqlite::params![event_id, position as i64, user_id, label])?;
  }
  Ok(())
}

/// Whether any of `users` has an event overlapping `[start, end)`.
fn any_overlap(
  conn: &Connection,
  users: &[UserId],
  start: &str,
  end: &str,
  exclude: Option<EventId>,
) -> rusqlite::Result<bool> {
  let sql = format!(
    "SELECT 1 FROM events e
     WHERE {INVOLVES_USER}
       AND e.start_at < ?3 AND e.end_at > ?2
       AND (?4 IS NULL OR e.event_id <> ?4)
     LIMIT 1"
  );
  let mut stmt = conn.prepare(&sql)?;
  for user in users {
    if stmt.exists(rusqlite::params![user, start, end, exclude])? {
      return Ok(true);
    }
  }
  Ok(false)
}

fn decode_guarded(guarded: Guarded<RawEvent>) -> Result<Guarded<Event>> {
  Ok(match guarded {
    Guarded::Written(raw) => Guarded::Written(raw.into_event()?),
    Guarded::Overlap => Guarded::Overlap,
  })
}

/// Column values of a [`NewEvent`], ready to move onto the database thread.
struct EventRow {
  users:        Vec<UserId>,
  owner_id:     UserId,
  title:        String,
  start_at:     String,
  end_at:       String,
  participants: Vec<(Option<i64>, Option<String>)>,
}

impl From<NewEvent> for EventRow {
  fn from(input: NewEvent) -> Self {
    Self {
      users:        input.involved_users(),
      owner_id:     input.owner_id,
      start_at:     encode_dt(input.start_at),
      end_at:       encode_dt(input.end_at),
      participants: input.participants.iter().map(encode_participant).collect(),
      title:        input.title,
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Datebook store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Several
/// stores (or processes) may open the same file; writes that must be
/// exclusive run in `IMMEDIATE` transactions.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CalendarStore impl ──────────────────────────────────────────────────────

impl CalendarStore for SqliteStore {
  type Error = crate::Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn create_event(&self, input: NewEvent) -> Result<Guarded<Event>> {
    let row = EventRow::from(input);
    let now = encode_dt(Utc::now());

    let guarded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if any_overlap(&tx, &row.users, &row.start_at, &row.end_at, None)? {
          return Ok(Guarded::Overlap);
        }

        tx.execute(
          "INSERT INTO events (owner_id, title, start_at, end_at, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![row.owner_id, row.title, row.start_at, row.end_at, now],
        )?;
        let event_id = tx.last_insert_rowid();
        write_participants(&tx, event_id, &row.participants)?;

        let raw = load_event(&tx, event_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Guarded::Written(raw))
      })
      .await?;

    decode_guarded(guarded)
  }

  async fn update_event(
    &self,
    id: EventId,
    input: NewEvent,
  ) -> Result<Option<Guarded<Event>>> {
    let row = EventRow::from(input);
    let now = encode_dt(Utc::now());

    let guarded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .prepare("SELECT 1 FROM events WHERE event_id = ?1")?
          .exists(rusqlite::params![id])?;
        if !exists {
          return Ok(None);
        }
        if any_overlap(&tx, &row.users, &row.start_at, &row.end_at, Some(id))? {
          return Ok(Some(Guarded::Overlap));
        }

        tx.execute(
          "UPDATE events
           SET title = ?2, start_at = ?3, end_at = ?4, updated_at = ?5,
               reminder_sent = 0, reminder_claimed_by = NULL, reminder_claimed_at = NULL
           WHERE event_id = ?1",
          rusqlite::params![id, row.title, row.start_at, row.end_at, now],
        )?;
        tx.execute(
          "DELETE FROM event_participants WHERE event_id = ?1",
          rusqlite::params![id],
        )?;
        write_participants(&tx, id, &row.participants)?;

        let raw = load_event(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Some(Guarded::Written(raw)))
      })
      .await?;

    guarded.map(decode_guarded).transpose()
  }

  async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
    let raw = self
      .conn
      .call(move |conn| Ok(load_event(conn, id)?))
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn delete_event(&self, id: EventId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM event_participants WHERE event_id = ?1",
          rusqlite::params![id],
        )?;
        let n = tx.execute("DELETE FROM events WHERE event_id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn list_events_for_user(&self, user: UserId) -> Result<Vec<Event>> {
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{SELECT_EVENT} WHERE {INVOLVES_USER} ORDER BY e.start_at, e.event_id"
        );
        Ok(query_events(conn, &sql, rusqlite::params![user])?)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn list_overlapping(
    &self,
    user: UserId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<EventId>,
  ) -> Result<Vec<Event>> {
    let start_str = encode_dt(start);
    let end_str   = encode_dt(end);

    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{SELECT_EVENT}
           WHERE {INVOLVES_USER}
             AND e.start_at < ?3 AND e.end_at > ?2
             AND (?4 IS NULL OR e.event_id <> ?4)
           ORDER BY e.start_at, e.event_id"
        );
        Ok(query_events(
          conn,
          &sql,
          rusqlite::params![user, start_str, end_str, exclude],
        )?)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  // ── Reminders ─────────────────────────────────────────────────────────────

  async fn claim_due_reminders(
    &self,
    now: DateTime<Utc>,
    lead: Duration,
    limit: usize,
    worker: Uuid,
  ) -> Result<Vec<Event>> {
    let now_str    = encode_dt(now);
    let until_str  = encode_dt(now + lead);
    let worker_str = worker.hyphenated().to_string();
    let limit      = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let claimed: Vec<EventId> = {
          let mut stmt = tx.prepare(
            "UPDATE events
             SET reminder_sent = 1, reminder_claimed_by = ?1, reminder_claimed_at = ?2
             WHERE reminder_sent = 0 AND event_id IN (
               SELECT event_id FROM events
               WHERE reminder_sent = 0 AND start_at >= ?2 AND start_at <= ?3
               ORDER BY start_at, event_id
               LIMIT ?4)
             RETURNING event_id",
          )?;
          stmt
            .query_map(
              rusqlite::params![worker_str, now_str, until_str, limit],
              |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut raws = Vec::with_capacity(claimed.len());
        for id in claimed {
          if let Some(raw) = load_event(&tx, id)? {
            raws.push(raw);
          }
        }
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    let mut events = raws
      .into_iter()
      .map(RawEvent::into_event)
      .collect::<Result<Vec<_>>>()?;
    events.sort_by(|a, b| (a.start_at, a.event_id).cmp(&(b.start_at, b.event_id)));

    if !events.is_empty() {
      debug!(%worker, claimed = events.len(), "claimed due reminders");
    }
    Ok(events)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn upsert_user(&self, input: UserUpsert) -> Result<User> {
    let user_id = input.user_id;
    let name    = input
      .name
      .map(|n| n.trim().to_owned())
      .filter(|n| !n.is_empty());
    let tag     = input.tag.as_deref().and_then(normalize_tag);
    let now     = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(tag) = &tag {
          tx.execute(
            "UPDATE users SET tag = NULL, updated_at = ?3
             WHERE tag = ?1 AND user_id <> ?2",
            rusqlite::params![tag, user_id, now],
          )?;
        }
        tx.execute(
          "INSERT INTO users (user_id, name, tag, timezone, updated_at)
           VALUES (?1, COALESCE(?2, CAST(?1 AS TEXT)), ?3, NULL, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             name       = COALESCE(?2, users.name),
             tag        = COALESCE(?3, users.tag),
             updated_at = ?4",
          rusqlite::params![user_id, name, tag, now],
        )?;
        let raw = load_user(&tx, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_user()
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let raw = self
      .conn
      .call(move |conn| Ok(load_user(conn, id)?))
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_users_by_alias<'a>(&'a self, alias: &'a str) -> Result<Vec<User>> {
    let alias = alias.to_owned();

    let raws = self
      .conn
      .call(move |conn| {
        let mut by_tag = conn.prepare(&format!("{SELECT_USER} WHERE tag = ?1 ORDER BY user_id"))?;
        let tagged = by_tag
          .query_map(rusqlite::params![alias], user_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        if !tagged.is_empty() {
          return Ok(tagged);
        }

        // SQLite's lower() only folds ASCII, so names are compared here.
        let mut all = conn.prepare(&format!("{SELECT_USER} ORDER BY user_id"))?;
        let named = all
          .query_map([], user_row)?
          .filter(|row| {
            row
              .as_ref()
              .map_or(true, |u| u.name.trim().to_lowercase() == alias)
          })
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(named)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn set_timezone(&self, id: UserId, timezone: String) -> Result<User> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO users (user_id, name, tag, timezone, updated_at)
           VALUES (?1, CAST(?1 AS TEXT), NULL, ?2, ?3)
           ON CONFLICT (user_id) DO UPDATE SET timezone = ?2, updated_at = ?3",
          rusqlite::params![id, timezone, now],
        )?;
        let raw = load_user(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_user()
  }

  // ── Diary ─────────────────────────────────────────────────────────────────

  async fn append_diary_entry(&self, input: NewDiaryEntry) -> Result<DiaryEntry> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO diary_entries (user_id, username, chat_id, message_id, text, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            input.user_id,
            input.username,
            input.chat_id,
            input.message_id,
            input.text,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("{SELECT_DIARY} WHERE entry_id = ?1"),
          rusqlite::params![id],
          diary_row,
        )?)
      })
      .await?;

    raw.into_entry()
  }

  async fn list_diary_entries(&self, user: UserId) -> Result<Vec<DiaryEntry>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SELECT_DIARY} WHERE user_id = ?1 ORDER BY created_at DESC, entry_id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user], diary_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDiaryEntry::into_entry).collect()
  }

  // ── Budget ────────────────────────────────────────────────────────────────

  async fn add_contribution(&self, input: NewContribution) -> Result<Contribution> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO budget_contributions (user_id, amount, comment, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.user_id, input.amount, input.comment, now],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("{SELECT_CONTRIBUTION} WHERE contribution_id = ?1"),
          rusqlite::params![id],
          contribution_row,
        )?)
      })
      .await?;

    raw.into_contribution()
  }

  async fn add_expense(&self, input: NewExpense) -> Result<Expense> {
    let now      = encode_dt(Utc::now());
    let spent_at = encode_dt(input.spent_at);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO expenses (user_id, amount, category, spent_at, comment, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            input.user_id,
            input.amount,
            input.category,
            spent_at,
            input.comment,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("{SELECT_EXPENSE} WHERE expense_id = ?1"),
          rusqlite::params![id],
          expense_row,
        )?)
      })
      .await?;

    raw.into_expense()
  }

  async fn list_expenses(&self, user: Option<UserId>, limit: usize) -> Result<Vec<Expense>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SELECT_EXPENSE}
           WHERE (?1 IS NULL OR user_id = ?1)
           ORDER BY spent_at DESC, expense_id DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user, limit], expense_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExpense::into_expense).collect()
  }

  async fn budget_totals(&self) -> Result<BudgetTotals> {
    let totals = self
      .conn
      .call(|conn| {
        let mut by_category = conn.prepare(
          "SELECT category, SUM(amount) AS total FROM expenses
           GROUP BY category ORDER BY total DESC, category",
        )?;
        let categories = by_category
          .query_map([], |row| {
            Ok(CategoryTotal { category: row.get(0)?, amount: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(BudgetTotals {
          contributors: shares(conn, "budget_contributions")?,
          spenders: shares(conn, "expenses")?,
          categories,
        })
      })
      .await?;

    Ok(totals)
  }

  async fn spent_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Amount> {
    let start_str = encode_dt(start);
    let end_str   = encode_dt(end);

    let spent = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(SUM(amount), 0) FROM expenses
           WHERE spent_at >= ?1 AND spent_at < ?2",
          rusqlite::params![start_str, end_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(spent)
  }

  async fn get_daily_limit(&self) -> Result<DailyLimit> {
    let raw = self
      .conn
      .call(|conn| Ok(load_daily_limit(conn)?))
      .await?;

    raw.map_or(Ok(DailyLimit::default()), RawDailyLimit::into_daily_limit)
  }

  async fn set_daily_limit(&self, limit: Option<Amount>, actor: UserId) -> Result<DailyLimit> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO budget_settings (id, daily_limit, updated_by, updated_at)
           VALUES (1, ?1, ?2, ?3)
           ON CONFLICT (id) DO UPDATE SET
             daily_limit = ?1, updated_by = ?2, updated_at = ?3",
          rusqlite::params![limit, actor, now],
        )?;
        let raw = load_daily_limit(&tx)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_daily_limit()
  }
}
