//! Row access for `users` and `user_roles`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{get_parsed, get_ts, ts_to_sql};
use crate::model::{Role, User};

pub fn insert_user(conn: &Connection, username: &str, created_at: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (username, created_at) VALUES (?, ?)",
        params![username, ts_to_sql(created_at)],
    )
    .with_context(|| format!("Failed to insert user {username}"))?;
    Ok(())
}

pub fn user_exists(conn: &Connection, username: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?)",
        params![username],
        |row| row.get(0),
    )
    .context("Failed to check user")
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .context("Failed to count users")
}

/// Grant a role. Returns false if the user already had it.
pub fn add_role(conn: &Connection, username: &str, role: Role) -> Result<bool> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO user_roles (username, role) VALUES (?, ?)",
            params![username, role.as_str()],
        )
        .with_context(|| format!("Failed to grant {role} to {username}"))?;
    Ok(changed > 0)
}

/// Revoke a role. Returns false if the user did not have it.
pub fn remove_role(conn: &Connection, username: &str, role: Role) -> Result<bool> {
    let changed = conn
        .execute(
            "DELETE FROM user_roles WHERE username = ? AND role = ?",
            params![username, role.as_str()],
        )
        .with_context(|| format!("Failed to revoke {role} from {username}"))?;
    Ok(changed > 0)
}

pub fn roles_of(conn: &Connection, username: &str) -> Result<Vec<Role>> {
    let mut stmt = conn
        .prepare("SELECT role FROM user_roles WHERE username = ?")
        .context("Failed to prepare roles query")?;
    let mut roles = stmt
        .query_map(params![username], |row| get_parsed::<Role>(row, 0))
        .context("Failed to execute roles query")?
        .collect::<rusqlite::Result<Vec<Role>>>()
        .context("Failed to read role row")?;
    roles.sort();
    Ok(roles)
}

pub fn get_user(conn: &Connection, username: &str) -> Result<Option<User>> {
    let created_at = conn
        .query_row(
            "SELECT created_at FROM users WHERE username = ?",
            params![username],
            |row| get_ts(row, 0),
        )
        .optional()
        .context("Failed to query user")?;

    let Some(created_at) = created_at else {
        return Ok(None);
    };

    Ok(Some(User {
        username: username.to_string(),
        roles: roles_of(conn, username)?,
        created_at,
    }))
}

/// List users, optionally only those holding `role`, by name.
pub fn list_users(conn: &Connection, role: Option<Role>) -> Result<Vec<User>> {
    let names: Vec<String> = match role {
        Some(r) => {
            let mut stmt = conn
                .prepare(
                    "SELECT u.username FROM users u
                     JOIN user_roles ur ON ur.username = u.username
                     WHERE ur.role = ? ORDER BY u.username",
                )
                .context("Failed to prepare user list query")?;
            let names = stmt
                .query_map(params![r.as_str()], |row| row.get(0))
                .context("Failed to execute user list query")?
                .collect::<rusqlite::Result<Vec<String>>>()
                .context("Failed to read user row")?;
            names
        }
        None => {
            let mut stmt = conn
                .prepare("SELECT username FROM users ORDER BY username")
                .context("Failed to prepare user list query")?;
            let names = stmt
                .query_map([], |row| row.get(0))
                .context("Failed to execute user list query")?
                .collect::<rusqlite::Result<Vec<String>>>()
                .context("Failed to read user row")?;
            names
        }
    };

    let mut users = Vec::with_capacity(names.len());
    for name in names {
        if let Some(user) = get_user(conn, &name)? {
            users.push(user);
        }
    }
    Ok(users)
}
