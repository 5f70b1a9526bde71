//! Flag service: file, resolve and query moderation flags.
//!
//! The ledger is append-only: filing never deduplicates, and resolving only
//! moves flags from unresolved to resolved.

use rusqlite::Connection;
use serde::Serialize;

use crate::model::{ids::new_flag_id, Flag, FlagKind};
use crate::store::{self, content, flags, Store};

use super::directory::{require_moderator, require_user};
use super::{require_text, CoreError, CoreResult};

/// Flag counts for one item.
#[derive(Debug, Clone, Serialize)]
pub struct FlagStatus {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub item_id: i64,
    pub total: i64,
    pub unresolved: i64,
    /// True when the item has flags and none is unresolved.
    pub resolved: bool,
}

/// Service for the moderation flag ledger.
pub struct FlagService<'a> {
    store: &'a Store,
}

impl<'a> FlagService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Append a flag. Items may be flagged any number of times.
    pub fn file(
        &self,
        kind: FlagKind,
        item_id: i64,
        flagged_by: &str,
        reason: &str,
    ) -> CoreResult<Flag> {
        let reason = require_text("reason", reason)?;
        let conn = self.store.conn();
        require_moderator(conn, flagged_by, "flag content")?;
        require_item(conn, kind, item_id)?;

        let flag = Flag {
            flag_id: new_flag_id(),
            kind,
            item_id,
            flagged_by: flagged_by.to_string(),
            reason,
            created_at: store::now(),
            resolved: false,
            resolved_by: None,
            resolved_at: None,
        };
        flags::insert_flag(conn, &flag).map_err(CoreError::storage)?;

        tracing::info!(flag_id = %flag.flag_id, %kind, item_id, flagged_by, "filed flag");
        Ok(flag)
    }

    /// Resolve every open flag on an item. Returns how many were resolved by
    /// this call; resolving an already resolved item returns 0.
    ///
    /// Returns `Err(CoreError::FlagNotFound)` if the item was never flagged.
    pub fn resolve(&self, item_id: i64, kind: FlagKind, resolved_by: &str) -> CoreResult<usize> {
        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        require_moderator(&tx, resolved_by, "resolve flags")?;
        let (total, _) = flags::item_counts(&tx, kind, item_id).map_err(CoreError::storage)?;
        if total == 0 {
            return Err(CoreError::FlagNotFound { kind, item_id });
        }
        let resolved = flags::resolve_item(&tx, kind, item_id, resolved_by, &store::now())
            .map_err(CoreError::storage)?;
        store::commit(tx).map_err(CoreError::storage)?;

        if resolved > 0 {
            tracing::info!(%kind, item_id, resolved_by, resolved, "resolved flags");
        } else {
            tracing::debug!(%kind, item_id, "flags already resolved");
        }
        Ok(resolved)
    }

    /// Counts and resolution state for one item.
    pub fn status(&self, item_id: i64, kind: FlagKind) -> CoreResult<FlagStatus> {
        let (total, unresolved) =
            flags::item_counts(self.store.conn(), kind, item_id).map_err(CoreError::storage)?;
        Ok(FlagStatus {
            kind,
            item_id,
            total,
            unresolved,
            resolved: total > 0 && unresolved == 0,
        })
    }

    /// True when the item has flags and all of them are resolved. An item
    /// that was never flagged is not "resolved".
    pub fn is_resolved(&self, item_id: i64, kind: FlagKind) -> CoreResult<bool> {
        Ok(self.status(item_id, kind)?.resolved)
    }

    /// Whether any flag on the item is still open.
    pub fn has_open_flag(&self, item_id: i64, kind: FlagKind) -> CoreResult<bool> {
        Ok(self.status(item_id, kind)?.unresolved > 0)
    }

    pub fn list_unresolved(&self) -> CoreResult<Vec<Flag>> {
        flags::list_unresolved(self.store.conn()).map_err(CoreError::storage)
    }

    /// Flags on `item_id`. Without `kind`, flags of every type sharing that
    /// id are returned.
    pub fn list_by_item(&self, item_id: i64, kind: Option<FlagKind>) -> CoreResult<Vec<Flag>> {
        flags::list_by_item(self.store.conn(), item_id, kind).map_err(CoreError::storage)
    }

    /// Open flags against content `username` authored or sent.
    pub fn unresolved_count_for(&self, username: &str) -> CoreResult<i64> {
        let conn = self.store.conn();
        require_user(conn, username)?;
        flags::count_unresolved_against(conn, username).map_err(CoreError::storage)
    }
}

/// Check that a flaggable item exists.
fn require_item(conn: &Connection, kind: FlagKind, item_id: i64) -> CoreResult<()> {
    match kind {
        FlagKind::Question => content::get_question(conn, item_id)
            .map_err(CoreError::storage)?
            .map(|_| ())
            .ok_or(CoreError::QuestionNotFound {
                question_id: item_id,
            }),
        FlagKind::Answer => content::get_answer(conn, item_id)
            .map_err(CoreError::storage)?
            .map(|_| ())
            .ok_or(CoreError::AnswerNotFound { answer_id: item_id }),
        FlagKind::Message => content::get_message(conn, item_id)
            .map_err(CoreError::storage)?
            .map(|_| ())
            .ok_or(CoreError::MessageNotFound {
                message_id: item_id,
            }),
    }
}
