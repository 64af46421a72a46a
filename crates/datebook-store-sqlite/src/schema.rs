//! SQL schema for the Datebook SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE … IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Everyone the bot has seen. `tag` is the lowercased alias without '@'.
CREATE TABLE IF NOT EXISTS users (
    user_id     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    tag         TEXT UNIQUE,
    timezone    TEXT,              -- IANA name; NULL means process default
    updated_at  TEXT NOT NULL
);

-- All instants are UTC, stored as fixed-width RFC 3339 text
-- (YYYY-MM-DDTHH:MM:SS.mmmZ) so string order is time order.
CREATE TABLE IF NOT EXISTS events (
    event_id             INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id             INTEGER NOT NULL,
    title                TEXT NOT NULL,
    start_at             TEXT NOT NULL,
    end_at               TEXT NOT NULL,
    reminder_sent        INTEGER NOT NULL DEFAULT 0,
    reminder_claimed_by  TEXT,     -- scheduler worker UUID
    reminder_claimed_at  TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    CHECK (start_at < end_at)
);

-- Ordered participant list. Exactly one of user_id / label is set.
CREATE TABLE IF NOT EXISTS event_participants (
    event_id  INTEGER NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
    position  INTEGER NOT NULL,
    user_id   INTEGER,
    label     TEXT,
    PRIMARY KEY (event_id, position),
    CHECK ((user_id IS NULL) != (label IS NULL))
);

-- Append-only.
CREATE TABLE IF NOT EXISTS diary_entries (
    entry_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    username    TEXT,
    chat_id     INTEGER NOT NULL,
    message_id  INTEGER NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- Shared budget. Amounts are whole currency units.
CREATE TABLE IF NOT EXISTS budget_contributions (
    contribution_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL,
    amount           INTEGER NOT NULL CHECK (amount > 0),
    comment          TEXT,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS expenses (
    expense_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    amount      INTEGER NOT NULL CHECK (amount > 0),
    category    TEXT NOT NULL,     -- lowercased
    spent_at    TEXT NOT NULL,
    comment     TEXT,
    created_at  TEXT NOT NULL
);

-- Exactly one row. NULL daily_limit means no limit.
CREATE TABLE IF NOT EXISTS budget_settings (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    daily_limit  INTEGER,
    updated_by   INTEGER,
    updated_at   TEXT
);
INSERT OR IGNORE INTO budget_settings (id, daily_limit) VALUES (1, NULL);

CREATE INDEX IF NOT EXISTS events_owner_idx        ON events(owner_id);
CREATE INDEX IF NOT EXISTS events_start_idx        ON events(start_at);
CREATE INDEX IF NOT EXISTS events_reminder_idx     ON events(reminder_sent, start_at);
CREATE INDEX IF NOT EXISTS participants_user_idx   ON event_participants(user_id);
CREATE INDEX IF NOT EXISTS diary_entries_user_idx  ON diary_entries(user_id);
CREATE INDEX IF NOT EXISTS contributions_user_idx  ON budget_contributions(user_id);
CREATE INDEX IF NOT EXISTS expenses_user_idx       ON expenses(user_id);
CREATE INDEX IF NOT EXISTS expenses_spent_idx      ON expenses(spent_at);

PRAGMA user_version = 2;
";
