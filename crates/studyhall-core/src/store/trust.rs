//! Row access for the `trusted_reviewers` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_ts, ts_to_sql};
use crate::model::TrustEntry;

const TRUST_COLUMNS: &str =
    "student, reviewer, weight, has_unseen_update, created_at, updated_at";

fn trust_from_row(row: &Row<'_>) -> rusqlite::Result<TrustEntry> {
    Ok(TrustEntry {
        student: row.get(0)?,
        reviewer: row.get(1)?,
        weight: row.get(2)?,
        has_unseen_update: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

/// Insert the pair or overwrite its weight. The unseen-update flag of an
/// existing pair is left alone.
pub fn upsert_trust(
    conn: &Connection,
    student: &str,
    reviewer: &str,
    weight: u8,
    now: &DateTime<Utc>,
) -> Result<()> {
    let ts = ts_to_sql(now);
    conn.execute(
        "INSERT INTO trusted_reviewers
             (student, reviewer, weight, has_unseen_update, created_at, updated_at)
         VALUES (?, ?, ?, 0, ?, ?)
         ON CONFLICT (student, reviewer) DO UPDATE SET
             weight = excluded.weight,
             updated_at = CASE WHEN weight = excluded.weight
                               THEN updated_at ELSE excluded.updated_at END",
        params![student, reviewer, weight, ts, ts],
    )
    .with_context(|| format!("Failed to upsert trust {student} -> {reviewer}"))?;
    Ok(())
}

pub fn get_trust(conn: &Connection, student: &str, reviewer: &str) -> Result<Option<TrustEntry>> {
    conn.query_row(
        &format!(
            "SELECT {TRUST_COLUMNS} FROM trusted_reviewers WHERE student = ? AND reviewer = ?"
        ),
        params![student, reviewer],
        trust_from_row,
    )
    .optional()
    .context("Failed to query trust entry")
}

pub fn delete_trust(conn: &Connection, student: &str, reviewer: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM trusted_reviewers WHERE student = ? AND reviewer = ?",
        params![student, reviewer],
    )
    .with_context(|| format!("Failed to delete trust {student} -> {reviewer}"))
}

/// Set or clear the unseen-update flag for one pair. Returns rows changed.
pub fn set_unseen(conn: &Connection, student: &str, reviewer: &str, unseen: bool) -> Result<usize> {
    conn.execute(
        "UPDATE trusted_reviewers SET has_unseen_update = ?
         WHERE student = ? AND reviewer = ? AND has_unseen_update != ?",
        params![unseen, student, reviewer, unseen],
    )
    .with_context(|| format!("Failed to update unseen flag {student} -> {reviewer}"))
}

/// Flag every student trusting `reviewer`. Returns how many pairs changed.
pub fn mark_all_followers(conn: &Connection, reviewer: &str) -> Result<usize> {
    conn.execute(
        "UPDATE trusted_reviewers SET has_unseen_update = 1
         WHERE reviewer = ? AND has_unseen_update = 0",
        params![reviewer],
    )
    .with_context(|| format!("Failed to notify followers of {reviewer}"))
}

/// All entries of a student, ordered by weight (highest first) then name.
pub fn list_for_student(conn: &Connection, student: &str) -> Result<Vec<TrustEntry>> {
    list_where(
        conn,
        "student = ? ORDER BY weight DESC, reviewer",
        student,
    )
}

/// All entries naming `reviewer`, ordered by student.
pub fn list_followers(conn: &Connection, reviewer: &str) -> Result<Vec<TrustEntry>> {
    list_where(conn, "reviewer = ? ORDER BY student", reviewer)
}

fn list_where(conn: &Connection, clause: &str, key: &str) -> Result<Vec<TrustEntry>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TRUST_COLUMNS} FROM trusted_reviewers WHERE {clause}"
        ))
        .context("Failed to prepare trust query")?;
    let rows = stmt
        .query_map(params![key], trust_from_row)
        .context("Failed to execute trust query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read trust row")?);
    }
    Ok(results)
}

/// Entries whose weight is outside the accepted range.
pub fn count_out_of_range(conn: &Connection, min: u8, max: u8) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM trusted_reviewers WHERE weight < ? OR weight > ?",
        params![min, max],
        |row| row.get(0),
    )
    .context("Failed to count out-of-range trust weights")
}
