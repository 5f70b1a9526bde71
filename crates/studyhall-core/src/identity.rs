//! Acting-user resolution.
//!
//! Determines who is performing an operation based on an explicit override,
//! the environment, or the configured default.

use anyhow::{bail, Result};
use std::env;

/// Environment variable checked for the acting user.
pub const IDENTITY_VAR: &str = "STUDYHALL_USER";

/// Get the acting user.
///
/// Resolution order:
/// 1. Explicit override (`--as`)
/// 2. `STUDYHALL_USER` environment variable
/// 3. `default_user` from config
///
/// Returns an error if none is set; every mutation must be attributable.
pub fn resolve_identity(explicit: Option<&str>, default_user: Option<&str>) -> Result<String> {
    resolve_with(explicit, env::var(IDENTITY_VAR).ok().as_deref(), default_user)
}

fn resolve_with(
    explicit: Option<&str>,
    from_env: Option<&str>,
    default_user: Option<&str>,
) -> Result<String> {
    for candidate in [explicit, from_env, default_user].into_iter().flatten() {
        let name = candidate.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }

    bail!(
        "Identity required. Use --as <username>, set {IDENTITY_VAR}, \
         or set default_user in .studyhall/config.toml."
    )
}
