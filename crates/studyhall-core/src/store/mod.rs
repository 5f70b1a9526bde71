//! SQLite storage for studyhall.
//!
//! `Store` owns the single connection of a session. Row-level functions live in
//! the submodules and take a plain `&Connection`, so the service layer can run
//! them either directly or inside a transaction.

#![allow(clippy::missing_errors_doc)]

pub mod content;
pub mod flags;
pub mod reviews;
pub mod trust;
pub mod users;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};

/// Database handle for one session.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories if they don't exist. `busy_timeout` bounds
    /// how long a writer waits for another process holding the write lock.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("Failed to enable WAL journal")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;

        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    /// Create an in-memory database (tests and throwaway sessions).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        Ok(Self { conn })
    }

    /// Initialize the database schema.
    ///
    /// Creates all tables and indexes if they don't exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;
        Ok(())
    }

    /// Begin a write transaction that takes the database write lock up front.
    ///
    /// Every multi-statement mutation goes through here so that two processes
    /// updating the same review chain are serialized by SQLite rather than
    /// interleaved.
    pub fn begin_immediate(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin immediate transaction")
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Commit a transaction opened with [`Store::begin_immediate`].
pub fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit().context("Failed to commit transaction")
}

/// Current time, truncated to what survives an RFC 3339 round trip.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

/// Read a nullable RFC 3339 timestamp column.
pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Read a TEXT column holding one of our enum spellings.
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

// ============================================================================
// Schema SQL
// ============================================================================

const SCHEMA_SQL: &str = r"
-- USERS
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_roles (
    username TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    role TEXT NOT NULL
        CHECK (role IN ('student', 'reviewer', 'instructor', 'staff', 'admin')),
    PRIMARY KEY (username, role)
);

CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role);

-- QUESTIONS
CREATE TABLE IF NOT EXISTS questions (
    question_id INTEGER PRIMARY KEY AUTOINCREMENT,
    author TEXT NOT NULL REFERENCES users(username),
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    accepted_answer_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_questions_author ON questions(author);

CREATE TABLE IF NOT EXISTS question_tags (
    question_id INTEGER NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (question_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_question_tags_tag ON question_tags(tag);

-- ANSWERS
CREATE TABLE IF NOT EXISTS answers (
    answer_id INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    parent_answer_id INTEGER REFERENCES answers(answer_id) ON DELETE SET NULL,
    author TEXT NOT NULL REFERENCES users(username),
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id);
CREATE INDEX IF NOT EXISTS idx_answers_parent ON answers(parent_answer_id);

-- MESSAGES
CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL REFERENCES users(username),
    recipient TEXT NOT NULL REFERENCES users(username),
    question_id INTEGER REFERENCES questions(question_id) ON DELETE SET NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1))
);

CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient, is_read);

-- REVIEWS
CREATE TABLE IF NOT EXISTS reviews (
    review_id TEXT PRIMARY KEY,
    reviewer TEXT NOT NULL REFERENCES users(username),
    target_type TEXT NOT NULL CHECK (target_type IN ('question', 'answer')),
    target_id INTEGER NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT,
    created_at TEXT NOT NULL,
    previous_review_id TEXT,
    is_latest INTEGER NOT NULL DEFAULT 1 CHECK (is_latest IN (0, 1))
);

-- At most one latest version per (reviewer, target).
CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_single_latest
    ON reviews(reviewer, target_type, target_id) WHERE is_latest = 1;
CREATE INDEX IF NOT EXISTS idx_reviews_pair ON reviews(reviewer, target_type, target_id);
CREATE INDEX IF NOT EXISTS idx_reviews_target ON reviews(target_type, target_id);
CREATE INDEX IF NOT EXISTS idx_reviews_previous ON reviews(previous_review_id);

-- TRUSTED REVIEWERS
CREATE TABLE IF NOT EXISTS trusted_reviewers (
    student TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    reviewer TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    weight INTEGER NOT NULL CHECK (weight BETWEEN 1 AND 5),
    has_unseen_update INTEGER NOT NULL DEFAULT 0 CHECK (has_unseen_update IN (0, 1)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (student, reviewer)
);

CREATE INDEX IF NOT EXISTS idx_trust_reviewer ON trusted_reviewers(reviewer);

-- FLAGS
CREATE TABLE IF NOT EXISTS flags (
    flag_id TEXT PRIMARY KEY,
    item_type TEXT NOT NULL CHECK (item_type IN ('QUESTION', 'ANSWER', 'MESSAGE')),
    item_id INTEGER NOT NULL,
    flagged_by TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0 CHECK (resolved IN (0, 1)),
    resolved_by TEXT,
    resolved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_flags_item ON flags(item_type, item_id);
CREATE INDEX IF NOT EXISTS idx_flags_resolved ON flags(resolved);
";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");

        let store = Store::open(&db_path, Duration::from_millis(100)).unwrap();
        store.init_schema().unwrap();
        assert!(db_path.exists());

        // Schema init is idempotent
        store.init_schema().unwrap();

        let tables: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('users', 'reviews', 'trusted_reviewers', 'flags')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_timestamp_roundtrip_keeps_micros() {
        let ts = now();
        let raw = ts_to_sql(&ts);
        assert_eq!(parse_ts(0, &raw).unwrap(), ts);
    }

    #[test]
    fn test_immediate_transaction_rolls_back_on_drop() {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();

        {
            let tx = store.begin_immediate().unwrap();
            tx.execute(
                "INSERT INTO users (username, created_at) VALUES ('ghost', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
            // dropped without commit
        }

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
