//! Row access for questions, answers, and messages.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_opt_ts, get_ts, ts_to_sql};
use crate::model::{Answer, Message, Question};

// ============================================================================
// Questions
// ============================================================================

const QUESTION_COLUMNS: &str =
    "question_id, author, title, body, accepted_answer_id, created_at, updated_at";

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        question_id: row.get(0)?,
        author: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        tags: Vec::new(),
        accepted_answer_id: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_opt_ts(row, 6)?,
    })
}

/// Insert a question and its tags. Returns the generated id.
pub fn insert_question(
    conn: &Connection,
    author: &str,
    title: &str,
    body: &str,
    tags: &[String],
    created_at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO questions (author, title, body, created_at) VALUES (?, ?, ?, ?)",
        params![author, title, body, ts_to_sql(created_at)],
    )
    .context("Failed to insert question")?;
    let question_id = conn.last_insert_rowid();
    replace_tags(conn, question_id, tags)?;
    Ok(question_id)
}

pub fn replace_tags(conn: &Connection, question_id: i64, tags: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM question_tags WHERE question_id = ?",
        params![question_id],
    )
    .context("Failed to clear question tags")?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO question_tags (question_id, tag) VALUES (?, ?)",
            params![question_id, tag],
        )
        .with_context(|| format!("Failed to tag question {question_id} with {tag}"))?;
    }
    Ok(())
}

fn tags_of(conn: &Connection, question_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM question_tags WHERE question_id = ? ORDER BY tag")
        .context("Failed to prepare tag query")?;
    let tags = stmt
        .query_map(params![question_id], |row| row.get(0))
        .context("Failed to execute tag query")?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("Failed to read tag row")?;
    Ok(tags)
}

pub fn get_question(conn: &Connection, question_id: i64) -> Result<Option<Question>> {
    let question = conn
        .query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE question_id = ?"),
            params![question_id],
            question_from_row,
        )
        .optional()
        .context("Failed to query question")?;

    match question {
        Some(mut q) => {
            q.tags = tags_of(conn, q.question_id)?;
            Ok(Some(q))
        }
        None => Ok(None),
    }
}

/// List questions, newest first, with optional tag and author filters.
pub fn list_questions(
    conn: &Connection,
    tag: Option<&str>,
    author: Option<&str>,
) -> Result<Vec<Question>> {
    let mut sql = format!("SELECT {QUESTION_COLUMNS} FROM questions q WHERE 1=1");
    let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(t) = tag {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM question_tags qt
                          WHERE qt.question_id = q.question_id AND qt.tag = ?)",
        );
        param_values.push(Box::new(t.to_string()));
    }
    if let Some(a) = author {
        sql.push_str(" AND q.author = ?");
        param_values.push(Box::new(a.to_string()));
    }
    sql.push_str(" ORDER BY q.created_at DESC, q.question_id DESC");

    let params: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare list_questions query")?;
    let rows = stmt
        .query_map(params.as_slice(), question_from_row)
        .context("Failed to execute list_questions query")?;

    let mut results = Vec::new();
    for row in rows {
        let mut q = row.context("Failed to read question row")?;
        q.tags = tags_of(conn, q.question_id)?;
        results.push(q);
    }
    Ok(results)
}

pub fn update_question(
    conn: &Connection,
    question_id: i64,
    title: &str,
    body: &str,
    now: &DateTime<Utc>,
) -> Result<usize> {
    conn.execute(
        "UPDATE questions SET title = ?, body = ?, updated_at = ? WHERE question_id = ?",
        params![title, body, ts_to_sql(now), question_id],
    )
    .with_context(|| format!("Failed to update question {question_id}"))
}

pub fn set_accepted_answer(
    conn: &Connection,
    question_id: i64,
    answer_id: Option<i64>,
) -> Result<usize> {
    conn.execute(
        "UPDATE questions SET accepted_answer_id = ? WHERE question_id = ?",
        params![answer_id, question_id],
    )
    .with_context(|| format!("Failed to set accepted answer on question {question_id}"))
}

/// Delete a question. Answers and tags go with it via foreign keys.
pub fn delete_question(conn: &Connection, question_id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM questions WHERE question_id = ?",
        params![question_id],
    )
    .with_context(|| format!("Failed to delete question {question_id}"))
}

// ============================================================================
// Answers
// ============================================================================

const ANSWER_COLUMNS: &str =
    "answer_id, question_id, parent_answer_id, author, body, created_at, updated_at";

fn answer_from_row(row: &Row<'_>) -> rusqlite::Result<Answer> {
    Ok(Answer {
        answer_id: row.get(0)?,
        question_id: row.get(1)?,
        parent_answer_id: row.get(2)?,
        author: row.get(3)?,
        body: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_opt_ts(row, 6)?,
    })
}

pub fn insert_answer(
    conn: &Connection,
    question_id: i64,
    parent_answer_id: Option<i64>,
    author: &str,
    body: &str,
    created_at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO answers (question_id, parent_answer_id, author, body, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![question_id, parent_answer_id, author, body, ts_to_sql(created_at)],
    )
    .context("Failed to insert answer")?;
    Ok(conn.last_insert_rowid())
}

pub fn get_answer(conn: &Connection, answer_id: i64) -> Result<Option<Answer>> {
    conn.query_row(
        &format!("SELECT {ANSWER_COLUMNS} FROM answers WHERE answer_id = ?"),
        params![answer_id],
        answer_from_row,
    )
    .optional()
    .context("Failed to query answer")
}

/// Answers to a question in posting order.
pub fn list_answers(conn: &Connection, question_id: i64) -> Result<Vec<Answer>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE question_id = ?
             ORDER BY created_at, answer_id"
        ))
        .context("Failed to prepare answer list query")?;
    let rows = stmt
        .query_map(params![question_id], answer_from_row)
        .context("Failed to execute answer list query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read answer row")?);
    }
    Ok(results)
}

/// Ids of every answer on a question (for cascading review cleanup).
pub fn answer_ids_for_question(conn: &Connection, question_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT answer_id FROM answers WHERE question_id = ?")
        .context("Failed to prepare answer id query")?;
    let ids = stmt
        .query_map(params![question_id], |row| row.get(0))
        .context("Failed to execute answer id query")?
        .collect::<rusqlite::Result<Vec<i64>>>()
        .context("Failed to read answer id row")?;
    Ok(ids)
}

pub fn update_answer(
    conn: &Connection,
    answer_id: i64,
    body: &str,
    now: &DateTime<Utc>,
) -> Result<usize> {
    conn.execute(
        "UPDATE answers SET body = ?, updated_at = ? WHERE answer_id = ?",
        params![body, ts_to_sql(now), answer_id],
    )
    .with_context(|| format!("Failed to update answer {answer_id}"))
}

/// Delete an answer, clearing it as the accepted answer if it was one.
/// Replies are re-parented to the top level by the foreign key.
pub fn delete_answer(conn: &Connection, answer_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE questions SET accepted_answer_id = NULL WHERE accepted_answer_id = ?",
        params![answer_id],
    )
    .context("Failed to clear accepted answer")?;
    conn.execute("DELETE FROM answers WHERE answer_id = ?", params![answer_id])
        .with_context(|| format!("Failed to delete answer {answer_id}"))
}

// ============================================================================
// Messages
// ============================================================================

const MESSAGE_COLUMNS: &str =
    "message_id, sender, recipient, question_id, body, created_at, is_read";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        message_id: row.get(0)?,
        sender: row.get(1)?,
        recipient: row.get(2)?,
        question_id: row.get(3)?,
        body: row.get(4)?,
        created_at: get_ts(row, 5)?,
        is_read: row.get(6)?,
    })
}

pub fn insert_message(
    conn: &Connection,
    sender: &str,
    recipient: &str,
    question_id: Option<i64>,
    body: &str,
    created_at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (sender, recipient, question_id, body, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![sender, recipient, question_id, body, ts_to_sql(created_at)],
    )
    .context("Failed to insert message")?;
    Ok(conn.last_insert_rowid())
}

pub fn get_message(conn: &Connection, message_id: i64) -> Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?"),
        params![message_id],
        message_from_row,
    )
    .optional()
    .context("Failed to query message")
}

/// Messages received by `recipient`, newest first.
pub fn list_inbox(conn: &Connection, recipient: &str, unread_only: bool) -> Result<Vec<Message>> {
    let filter = if unread_only { " AND is_read = 0" } else { "" };
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE recipient = ?{filter}
             ORDER BY created_at DESC, message_id DESC"
        ))
        .context("Failed to prepare inbox query")?;
    let rows = stmt
        .query_map(params![recipient], message_from_row)
        .context("Failed to execute inbox query")?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.context("Failed to read message row")?);
    }
    Ok(results)
}

pub fn mark_read(conn: &Connection, message_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE messages SET is_read = 1 WHERE message_id = ? AND is_read = 0",
        params![message_id],
    )
    .with_context(|| format!("Failed to mark message {message_id} read"))
}

pub fn count_unread(conn: &Connection, recipient: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE recipient = ? AND is_read = 0",
        params![recipient],
        |row| row.get(0),
    )
    .context("Failed to count unread messages")
}
