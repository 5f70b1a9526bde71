//! ID generation for review versions and flags.
//!
//! Uses short, human-readable slugs: rv-xxxxxxxx, fl-xxxxxxxx. Content rows
//! (questions, answers, messages) use database-generated integer ids instead.

use uuid::Uuid;

/// Prefix for review version IDs
const REVIEW_PREFIX: &str = "rv";
/// Prefix for flag IDs
const FLAG_PREFIX: &str = "fl";

/// Length of the random suffix (in base36 chars)
const SUFFIX_LEN: usize = 8;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a base36 suffix from UUID bytes.
fn base36_suffix(len: usize) -> String {
    let mut n = Uuid::new_v4().as_u128();

    let mut result = String::with_capacity(len);
    while result.len() < len {
        let digit = u8::try_from(n % 36).unwrap_or_default();
        result.push(char::from(BASE36[usize::from(digit)]));
        n /= 36;
    }

    result
}

/// Generate a new review version ID (e.g., "rv-1d3f9a0k")
#[must_use]
pub fn new_review_id() -> String {
    format!("{REVIEW_PREFIX}-{}", base36_suffix(SUFFIX_LEN))
}

/// Generate a new flag ID (e.g., "fl-99az0c1x")
#[must_use]
pub fn new_flag_id() -> String {
    format!("{FLAG_PREFIX}-{}", base36_suffix(SUFFIX_LEN))
}

fn has_slug_shape(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| {
            suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| BASE36.contains(&b))
        })
}

/// Check if a string looks like a valid review ID
#[must_use]
pub fn is_review_id(s: &str) -> bool {
    has_slug_shape(s, REVIEW_PREFIX)
}
