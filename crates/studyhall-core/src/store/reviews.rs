//! Row access for the `reviews` table.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{get_parsed, get_ts, ts_to_sql};
use crate::model::{Review, ReviewTarget, TargetKind};

const REVIEW_COLUMNS: &str = "review_id, reviewer, target_type, target_id, rating, comment, \
                              created_at, previous_review_id, is_latest";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        review_id: row.get(0)?,
        reviewer: row.get(1)?,
        target_type: get_parsed::<TargetKind>(row, 2)?,
        target_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: get_ts(row, 6)?,
        previous_review_id: row.get(7)?,
        is_latest: row.get(8)?,
    })
}

fn collect_reviews(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Review>> {
    let mut stmt = conn
        .prepare(sql)
        .context("Failed to prepare review query")?;
    let rows = stmt
        .query_map(params, review_from_row)
        .context("Failed to execute review query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read review row")?);
    }
    Ok(results)
}

/// Insert one review version.
pub fn insert_review(conn: &Connection, review: &Review) -> Result<()> {
    conn.execute(
        "INSERT INTO reviews (
            review_id, reviewer, target_type, target_id, rating, comment,
            created_at, previous_review_id, is_latest
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            review.review_id,
            review.reviewer,
            review.target_type.as_str(),
            review.target_id,
            review.rating,
            review.comment,
            ts_to_sql(&review.created_at),
            review.previous_review_id,
            review.is_latest,
        ],
    )
    .with_context(|| format!("Failed to insert review {}", review.review_id))?;
    Ok(())
}

/// Get a single review version by id.
pub fn get_review(conn: &Connection, review_id: &str) -> Result<Option<Review>> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE review_id = ?"),
        params![review_id],
        review_from_row,
    )
    .optional()
    .context("Failed to query review")
}

/// Get the latest version for a (reviewer, target) pair.
pub fn get_latest(
    conn: &Connection,
    reviewer: &str,
    target: ReviewTarget,
) -> Result<Option<Review>> {
    conn.query_row(
        &format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE reviewer = ? AND target_type = ? AND target_id = ? AND is_latest = 1"
        ),
        params![reviewer, target.kind.as_str(), target.id],
        review_from_row,
    )
    .optional()
    .context("Failed to query latest review")
}

/// Clear the latest flag on `review_id`, but only if it is still set.
///
/// Returns the number of rows changed (0 means someone else already
/// superseded it, or it does not exist).
pub fn clear_latest(conn: &Connection, review_id: &str) -> Result<usize> {
    conn.execute(
        "UPDATE reviews SET is_latest = 0 WHERE review_id = ? AND is_latest = 1",
        params![review_id],
    )
    .with_context(|| format!("Failed to clear latest flag on {review_id}"))
}

/// All stored versions for a (reviewer, target) pair, in no particular order.
pub fn list_versions(
    conn: &Connection,
    reviewer: &str,
    target: ReviewTarget,
) -> Result<Vec<Review>> {
    collect_reviews(
        conn,
        &format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE reviewer = ? AND target_type = ? AND target_id = ?"
        ),
        &[&reviewer, &target.kind.as_str(), &target.id],
    )
}

/// Latest versions of every reviewer's review of a target, newest first.
pub fn list_latest_for_target(conn: &Connection, target: ReviewTarget) -> Result<Vec<Review>> {
    collect_reviews(
        conn,
        &format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE target_type = ? AND target_id = ? AND is_latest = 1
             ORDER BY created_at DESC"
        ),
        &[&target.kind.as_str(), &target.id],
    )
}

/// Latest versions of everything a reviewer has reviewed, newest first.
pub fn list_latest_by_reviewer(conn: &Connection, reviewer: &str) -> Result<Vec<Review>> {
    collect_reviews(
        conn,
        &format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE reviewer = ? AND is_latest = 1
             ORDER BY created_at DESC"
        ),
        &[&reviewer],
    )
}

/// Delete one review row. Returns rows deleted.
pub fn delete_review(conn: &Connection, review_id: &str) -> Result<usize> {
    conn.execute("DELETE FROM reviews WHERE review_id = ?", params![review_id])
        .with_context(|| format!("Failed to delete review {review_id}"))
}

/// Drop links pointing at `review_id` from later versions.
pub fn unlink_successors(conn: &Connection, review_id: &str) -> Result<usize> {
    conn.execute(
        "UPDATE reviews SET previous_review_id = NULL WHERE previous_review_id = ?",
        params![review_id],
    )
    .with_context(|| format!("Failed to unlink successors of {review_id}"))
}

/// Delete every version attached to a target (used when content is deleted).
pub fn delete_for_target(conn: &Connection, target: ReviewTarget) -> Result<usize> {
    conn.execute(
        "DELETE FROM reviews WHERE target_type = ? AND target_id = ?",
        params![target.kind.as_str(), target.id],
    )
    .with_context(|| format!("Failed to delete reviews of {target}"))
}

// ============================================================================
// Integrity queries
// ============================================================================

/// A (reviewer, target) pair and how many latest rows it has.
#[derive(Debug, Clone, Serialize)]
pub struct PairLatestCount {
    pub reviewer: String,
    pub target_type: String,
    pub target_id: i64,
    pub latest_count: i64,
}

/// Pairs whose latest count is not exactly one.
pub fn pairs_with_bad_latest_count(conn: &Connection) -> Result<Vec<PairLatestCount>> {
    let mut stmt = conn
        .prepare(
            "SELECT reviewer, target_type, target_id, SUM(is_latest) AS latest_count
             FROM reviews
             GROUP BY reviewer, target_type, target_id
             HAVING latest_count != 1
             ORDER BY reviewer, target_type, target_id",
        )
        .context("Failed to prepare latest-count query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PairLatestCount {
                reviewer: row.get(0)?,
                target_type: row.get(1)?,
                target_id: row.get(2)?,
                latest_count: row.get(3)?,
            })
        })
        .context("Failed to execute latest-count query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read latest-count row")?);
    }
    Ok(results)
}

/// Review ids whose `previous_review_id` does not resolve to a row.
pub fn dangling_links(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT r.review_id FROM reviews r
             LEFT JOIN reviews p ON p.review_id = r.previous_review_id
             WHERE r.previous_review_id IS NOT NULL AND p.review_id IS NULL
             ORDER BY r.review_id",
        )
        .context("Failed to prepare dangling-link query")?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to execute dangling-link query")?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Failed to read dangling-link row")?;
    Ok(ids)
}

/// Review ids timestamped before the version they supersede.
pub fn out_of_order_links(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT r.review_id FROM reviews r
             JOIN reviews p ON p.review_id = r.previous_review_id
             WHERE r.created_at < p.created_at
             ORDER BY r.review_id",
        )
        .context("Failed to prepare chain-order query")?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to execute chain-order query")?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Failed to read chain-order row")?;
    Ok(ids)
}
