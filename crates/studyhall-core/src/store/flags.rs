//! Row access for the `flags` ledger.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{get_opt_ts, get_parsed, get_ts, ts_to_sql};
use crate::model::{Flag, FlagKind};

const FLAG_COLUMNS: &str = "flag_id, item_type, item_id, flagged_by, reason, created_at, \
                            resolved, resolved_by, resolved_at";

fn flag_from_row(row: &Row<'_>) -> rusqlite::Result<Flag> {
    Ok(Flag {
        flag_id: row.get(0)?,
        kind: get_parsed::<FlagKind>(row, 1)?,
        item_id: row.get(2)?,
        flagged_by: row.get(3)?,
        reason: row.get(4)?,
        created_at: get_ts(row, 5)?,
        resolved: row.get(6)?,
        resolved_by: row.get(7)?,
        resolved_at: get_opt_ts(row, 8)?,
    })
}

fn collect_flags(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Flag>> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare flag query")?;
    let rows = stmt
        .query_map(params, flag_from_row)
        .context("Failed to execute flag query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read flag row")?);
    }
    Ok(results)
}

/// Append a flag to the ledger.
pub fn insert_flag(conn: &Connection, flag: &Flag) -> Result<()> {
    conn.execute(
        "INSERT INTO flags (
            flag_id, item_type, item_id, flagged_by, reason, created_at,
            resolved, resolved_by, resolved_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            flag.flag_id,
            flag.kind.as_str(),
            flag.item_id,
            flag.flagged_by,
            flag.reason,
            ts_to_sql(&flag.created_at),
            flag.resolved,
            flag.resolved_by,
            flag.resolved_at.as_ref().map(ts_to_sql),
        ],
    )
    .with_context(|| format!("Failed to insert flag {}", flag.flag_id))?;
    Ok(())
}

/// Resolve every unresolved flag on an item. Returns how many changed.
pub fn resolve_item(
    conn: &Connection,
    kind: FlagKind,
    item_id: i64,
    resolved_by: &str,
    now: &DateTime<Utc>,
) -> Result<usize> {
    conn.execute(
        "UPDATE flags SET resolved = 1, resolved_by = ?, resolved_at = ?
         WHERE item_type = ? AND item_id = ? AND resolved = 0",
        params![resolved_by, ts_to_sql(now), kind.as_str(), item_id],
    )
    .with_context(|| format!("Failed to resolve flags on {kind} {item_id}"))
}

/// (total, unresolved) flag counts for an item.
pub fn item_counts(conn: &Connection, kind: FlagKind, item_id: i64) -> Result<(i64, i64)> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN resolved = 0 THEN 1 ELSE 0 END), 0)
         FROM flags WHERE item_type = ? AND item_id = ?",
        params![kind.as_str(), item_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .context("Failed to count flags")
}

/// Unresolved flags, oldest first.
pub fn list_unresolved(conn: &Connection) -> Result<Vec<Flag>> {
    collect_flags(
        conn,
        &format!(
            "SELECT {FLAG_COLUMNS} FROM flags WHERE resolved = 0 ORDER BY created_at, flag_id"
        ),
        &[],
    )
}

/// Flags on an item id, optionally narrowed to one kind, oldest first.
pub fn list_by_item(conn: &Connection, item_id: i64, kind: Option<FlagKind>) -> Result<Vec<Flag>> {
    match kind {
        Some(k) => collect_flags(
            conn,
            &format!(
                "SELECT {FLAG_COLUMNS} FROM flags WHERE item_id = ? AND item_type = ?
                 ORDER BY created_at, flag_id"
            ),
            &[&item_id, &k.as_str()],
        ),
        None => collect_flags(
            conn,
            &format!(
                "SELECT {FLAG_COLUMNS} FROM flags WHERE item_id = ?
                 ORDER BY created_at, flag_id"
            ),
            &[&item_id],
        ),
    }
}

/// Unresolved flags against content authored or sent by `username`.
pub fn count_unresolved_against(conn: &Connection, username: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM flags f
         WHERE f.resolved = 0 AND (
            (f.item_type = 'QUESTION' AND EXISTS (
                SELECT 1 FROM questions q WHERE q.question_id = f.item_id AND q.author = ?1))
         OR (f.item_type = 'ANSWER' AND EXISTS (
                SELECT 1 FROM answers a WHERE a.answer_id = f.item_id AND a.author = ?1))
         OR (f.item_type = 'MESSAGE' AND EXISTS (
                SELECT 1 FROM messages m WHERE m.message_id = f.item_id AND m.sender = ?1))
         )",
        params![username],
        |row| row.get(0),
    )
    .context("Failed to count unresolved flags")
}

/// Flag ids whose item no longer exists.
pub fn orphaned(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT f.flag_id FROM flags f
             WHERE (f.item_type = 'QUESTION'
                    AND NOT EXISTS (SELECT 1 FROM questions q WHERE q.question_id = f.item_id))
                OR (f.item_type = 'ANSWER'
                    AND NOT EXISTS (SELECT 1 FROM answers a WHERE a.answer_id = f.item_id))
                OR (f.item_type = 'MESSAGE'
                    AND NOT EXISTS (SELECT 1 FROM messages m WHERE m.message_id = f.item_id))
             ORDER BY f.flag_id",
        )
        .context("Failed to prepare orphaned-flag query")?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to execute orphaned-flag query")?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Failed to read orphaned-flag row")?;
    Ok(ids)
}
