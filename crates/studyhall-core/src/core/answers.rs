//! Answer service: post, edit and delete threaded answers.

use std::collections::{HashMap, HashSet};

use crate::model::{Answer, ReviewTarget};
use crate::store::{self, content, reviews, Store};

use super::directory::require_user;
use super::questions::can_administer;
use super::{require_text, CoreError, CoreResult};

/// Service for answers.
pub struct AnswerService<'a> {
    store: &'a Store,
}

impl<'a> AnswerService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Post an answer, optionally as a reply to another answer on the same
    /// question.
    pub fn post(
        &self,
        author: &str,
        question_id: i64,
        body: &str,
        parent_answer_id: Option<i64>,
    ) -> CoreResult<Answer> {
        let body = require_text("body", body)?;

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        require_user(&tx, author)?;
        content::get_question(&tx, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        if let Some(parent_id) = parent_answer_id {
            let parent = content::get_answer(&tx, parent_id)
                .map_err(CoreError::storage)?
                .ok_or(CoreError::AnswerNotFound {
                    answer_id: parent_id,
                })?;
            if parent.question_id != question_id {
                return Err(CoreError::validation(
                    "parent",
                    format!(
                        "answer {parent_id} belongs to question {}, not {question_id}",
                        parent.question_id
                    ),
                ));
            }
        }

        let answer_id = content::insert_answer(
            &tx,
            question_id,
            parent_answer_id,
            author,
            &body,
            &store::now(),
        )
        .map_err(CoreError::storage)?;
        let answer = content::get_answer(&tx, answer_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::AnswerNotFound { answer_id })?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(answer_id, question_id, author, "posted answer");
        Ok(answer)
    }

    /// Get an answer.
    ///
    /// Returns `Err(CoreError::AnswerNotFound)` if it does not exist.
    pub fn get(&self, answer_id: i64) -> CoreResult<Answer> {
        self.get_optional(answer_id)?
            .ok_or(CoreError::AnswerNotFound { answer_id })
    }

    pub fn get_optional(&self, answer_id: i64) -> CoreResult<Option<Answer>> {
        content::get_answer(self.store.conn(), answer_id).map_err(CoreError::storage)
    }

    /// Answers to a question in thread order: each answer is followed by
    /// its replies.
    pub fn list_for_question(&self, question_id: i64) -> CoreResult<Vec<Answer>> {
        let conn = self.store.conn();
        content::get_question(conn, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        let answers = content::list_answers(conn, question_id).map_err(CoreError::storage)?;
        Ok(thread_order(answers))
    }

    /// Replace an answer's body. Author only.
    pub fn edit(&self, actor: &str, answer_id: i64, body: &str) -> CoreResult<Answer> {
        let body = require_text("body", body)?;
        let conn = self.store.conn();
        let answer = self.get(answer_id)?;
        if answer.author != actor {
            return Err(CoreError::Forbidden {
                username: actor.to_string(),
                action: format!("edit answer {answer_id}"),
            });
        }
        content::update_answer(conn, answer_id, &body, &store::now())
            .map_err(CoreError::storage)?;
        tracing::info!(answer_id, actor, "edited answer");
        self.get(answer_id)
    }

    /// Delete an answer and the reviews attached to it. Replies move to the
    /// top level. Allowed for the author, instructors and admins.
    ///
    /// Returns how many review versions were removed.
    pub fn delete(&self, actor: &str, answer_id: i64) -> CoreResult<usize> {
        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        let answer = content::get_answer(&tx, answer_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::AnswerNotFound { answer_id })?;
        let user = require_user(&tx, actor)?;
        if answer.author != actor && !can_administer(&user) {
            return Err(CoreError::Forbidden {
                username: actor.to_string(),
                action: format!("delete answer {answer_id}"),
            });
        }

        let reviews_removed = reviews::delete_for_target(&tx, ReviewTarget::answer(answer_id))
            .map_err(CoreError::storage)?;
        content::delete_answer(&tx, answer_id).map_err(CoreError::storage)?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(answer_id, actor, reviews = reviews_removed, "deleted answer");
        Ok(reviews_removed)
    }
}

/// Depth-first order over the reply tree, siblings in posting order.
fn thread_order(answers: Vec<Answer>) -> Vec<Answer> {
    let ids: HashSet<i64> = answers.iter().map(|a| a.answer_id).collect();
    let mut children: HashMap<Option<i64>, Vec<Answer>> = HashMap::new();
    for answer in answers {
        // a reply whose parent is gone is shown at the top level
        let parent = answer.parent_answer_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(answer);
    }

    let mut ordered = Vec::with_capacity(ids.len());
    let mut stack: Vec<Answer> = children.remove(&None).unwrap_or_default();
    stack.reverse();
    while let Some(answer) = stack.pop() {
        if let Some(mut replies) = children.remove(&Some(answer.answer_id)) {
            replies.reverse();
            stack.extend(replies);
        }
        ordered.push(answer);
    }
    ordered
}
