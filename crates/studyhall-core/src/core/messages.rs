//! Message service: direct messages between users.

use crate::model::Message;
use crate::store::{self, content, Store};

use super::directory::require_user;
use super::{require_text, CoreError, CoreResult};

pub struct MessageService<'a> {
    store: &'a Store,
}

impl<'a> MessageService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Send a message, optionally about a question.
    pub fn send(
        &self,
        sender: &str,
        recipient: &str,
        body: &str,
        question_id: Option<i64>,
    ) -> CoreResult<Message> {
        let body = require_text("body", body)?;
        if sender == recipient {
            return Err(CoreError::validation("recipient", "cannot message yourself"));
        }

        let conn = self.store.conn();
        require_user(conn, sender)?;
        require_user(conn, recipient)?;
        if let Some(question_id) = question_id {
            content::get_question(conn, question_id)
                .map_err(CoreError::storage)?
                .ok_or(CoreError::QuestionNotFound { question_id })?;
        }

        let message_id =
            content::insert_message(conn, sender, recipient, question_id, &body, &store::now())
                .map_err(CoreError::storage)?;
        tracing::info!(message_id, sender, recipient, "sent message");
        self.get(message_id)
    }

    pub fn get(&self, message_id: i64) -> CoreResult<Message> {
        content::get_message(self.store.conn(), message_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::MessageNotFound { message_id })
    }

    /// Messages received by `user`, newest first.
    pub fn inbox(&self, user: &str, unread_only: bool) -> CoreResult<Vec<Message>> {
        let conn = self.store.conn();
        require_user(conn, user)?;
        content::list_inbox(conn, user, unread_only).map_err(CoreError::storage)
    }

    /// Mark a message read. Only its recipient may do this.
    ///
    /// Returns `false` if it was already read.
    pub fn mark_read(&self, message_id: i64, user: &str) -> CoreResult<bool> {
        let message = self.get(message_id)?;
        if message.recipient != user {
            return Err(CoreError::Forbidden {
                username: user.to_string(),
                action: format!("read message {message_id}"),
            });
        }
        let changed =
            content::mark_read(self.store.conn(), message_id).map_err(CoreError::storage)?;
        Ok(changed > 0)
    }

    pub fn unread_count(&self, user: &str) -> CoreResult<i64> {
        content::count_unread(self.store.conn(), user).map_err(CoreError::storage)
    }
}
