//! Inbox service: what a user should look at next.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::store::{content, flags, trust, Store};

use super::directory::require_user;
use super::trust::TrustService;
use super::{CoreError, CoreResult};

/// Notification counts for one user.
#[derive(Debug, Clone, Serialize)]
pub struct InboxSummary {
    pub username: String,
    /// Trusted reviewers who posted a review version the user has not seen.
    pub updated_reviewers: BTreeSet<String>,
    pub unread_messages: i64,
    /// Open flags against content the user authored or sent.
    pub unresolved_flags_against_me: i64,
}

impl InboxSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated_reviewers.is_empty()
            && self.unread_messages == 0
            && self.unresolved_flags_against_me == 0
    }
}

/// Service for inbox operations.
pub struct InboxService<'a> {
    store: &'a Store,
}

impl<'a> InboxService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Get the complete summary for a user.
    pub fn summary(&self, username: &str) -> CoreResult<InboxSummary> {
        let conn = self.store.conn();
        require_user(conn, username)?;

        let updated_reviewers = trust::list_for_student(conn, username)
            .map_err(CoreError::storage)?
            .into_iter()
            .filter(|e| e.has_unseen_update)
            .map(|e| e.reviewer)
            .collect();
        let unread_messages = content::count_unread(conn, username).map_err(CoreError::storage)?;
        let unresolved_flags_against_me =
            flags::count_unresolved_against(conn, username).map_err(CoreError::storage)?;

        Ok(InboxSummary {
            username: username.to_string(),
            updated_reviewers,
            unread_messages,
            unresolved_flags_against_me,
        })
    }

    /// Does `reviewer` have an update `student` has not seen?
    pub fn has_unseen_update(&self, student: &str, reviewer: &str) -> CoreResult<bool> {
        TrustService::new(self.store).has_unseen_update(student, reviewer)
    }

    /// Open flags against `username`'s content.
    pub fn unresolved_flag_count(&self, username: &str) -> CoreResult<i64> {
        flags::count_unresolved_against(self.store.conn(), username).map_err(CoreError::storage)
    }
}
