//! Question service: ask, edit, delete and accept answers.

use serde::Serialize;

use crate::model::{Question, ReviewTarget, Role, User};
use crate::store::{self, content, reviews, Store};

use super::directory::require_user;
use super::{require_text, CoreError, CoreResult};

const MAX_TITLE_LEN: usize = 200;

/// What [`QuestionService::delete`] removed.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedQuestion {
    pub question_id: i64,
    pub answers_removed: usize,
    pub reviews_removed: usize,
}

/// Service for questions.
pub struct QuestionService<'a> {
    store: &'a Store,
}

impl<'a> QuestionService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Ask a question. Tags are trimmed, lowercased and deduplicated.
    pub fn ask(
        &self,
        author: &str,
        title: &str,
        body: &str,
        tags: &[String],
    ) -> CoreResult<Question> {
        let title = validate_title(title)?;
        let body = require_text("body", body)?;
        let tags = normalize_tags(tags);

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        require_user(&tx, author)?;
        let question_id = content::insert_question(&tx, author, &title, &body, &tags, &store::now())
            .map_err(CoreError::storage)?;
        let question = content::get_question(&tx, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(question_id, author, tags = ?question.tags, "asked question");
        Ok(question)
    }

    /// Get a question.
    ///
    /// Returns `Err(CoreError::QuestionNotFound)` if it does not exist.
    pub fn get(&self, question_id: i64) -> CoreResult<Question> {
        self.get_optional(question_id)?
            .ok_or(CoreError::QuestionNotFound { question_id })
    }

    pub fn get_optional(&self, question_id: i64) -> CoreResult<Option<Question>> {
        content::get_question(self.store.conn(), question_id).map_err(CoreError::storage)
    }

    /// Newest first, optionally filtered by tag and author.
    pub fn list(&self, tag: Option<&str>, author: Option<&str>) -> CoreResult<Vec<Question>> {
        let tag = tag.map(|t| t.trim().to_lowercase());
        content::list_questions(self.store.conn(), tag.as_deref(), author)
            .map_err(CoreError::storage)
    }

    /// Change the title, body or tags of a question. Author only.
    pub fn edit(
        &self,
        actor: &str,
        question_id: i64,
        title: Option<&str>,
        body: Option<&str>,
        tags: Option<&[String]>,
    ) -> CoreResult<Question> {
        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        let current = content::get_question(&tx, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        if current.author != actor {
            return Err(CoreError::Forbidden {
                username: actor.to_string(),
                action: format!("edit question {question_id}"),
            });
        }

        let title = title.map_or(Ok(current.title), validate_title)?;
        let body = body.map_or(Ok(current.body), |b| require_text("body", b))?;
        content::update_question(&tx, question_id, &title, &body, &store::now())
            .map_err(CoreError::storage)?;
        if let Some(tags) = tags {
            content::replace_tags(&tx, question_id, &normalize_tags(tags))
                .map_err(CoreError::storage)?;
        }
        let question = content::get_question(&tx, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(question_id, actor, "edited question");
        Ok(question)
    }

    /// Delete a question with its answers and every review attached to
    /// either. Allowed for the author, instructors and admins.
    pub fn delete(&self, actor: &str, question_id: i64) -> CoreResult<DeletedQuestion> {
        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        let question = content::get_question(&tx, question_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::QuestionNotFound { question_id })?;
        let user = require_user(&tx, actor)?;
        if question.author != actor && !can_administer(&user) {
            return Err(CoreError::Forbidden {
                username: actor.to_string(),
                action: format!("delete question {question_id}"),
            });
        }

        let answer_ids =
            content::answer_ids_for_question(&tx, question_id).map_err(CoreError::storage)?;
        let mut reviews_removed =
            reviews::delete_for_target(&tx, ReviewTarget::question(question_id))
                .map_err(CoreError::storage)?;
        for answer_id in &answer_ids {
            reviews_removed += reviews::delete_for_target(&tx, ReviewTarget::answer(*answer_id))
                .map_err(CoreError::storage)?;
        }
        content::delete_question(&tx, question_id).map_err(CoreError::storage)?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(
            question_id,
            actor,
            answers = answer_ids.len(),
            reviews = reviews_removed,
            "deleted question"
        );
        Ok(DeletedQuestion {
            question_id,
            answers_removed: answer_ids.len(),
            reviews_removed,
        })
    }

    /// Mark an answer as accepted. Author only; the answer must belong to
    /// the question.
    pub fn accept_answer(
        &self,
        actor: &str,
        question_id: i64,
        answer_id: i64,
    ) -> CoreResult<Question> {
        let conn = self.store.conn();
        let question = self.get(question_id)?;
        if question.author != actor {
            return Err(CoreError::Forbidden {
                username: actor.to_string(),
                action: format!("accept an answer on question {question_id}"),
            });
        }
        let answer = content::get_answer(conn, answer_id)
            .map_err(CoreError::storage)?
            .ok_or(CoreError::AnswerNotFound { answer_id })?;
        if answer.question_id != question_id {
            return Err(CoreError::validation(
                "answer",
                format!("answer {answer_id} belongs to question {}", answer.question_id),
            ));
        }

        content::set_accepted_answer(conn, question_id, Some(answer_id))
            .map_err(CoreError::storage)?;
        tracing::info!(question_id, answer_id, "accepted answer");
        self.get(question_id)
    }
}

/// Instructors and admins may remove anyone's content.
pub(crate) fn can_administer(user: &User) -> bool {
    user.has_role(Role::Instructor) || user.has_role(Role::Admin)
}

fn validate_title(title: &str) -> CoreResult<String> {
    let title = require_text("title", title)?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(title)
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{seed_thread, services_with_cast};
    use crate::core::ErrorKind;

    #[test]
    fn test_ask_normalizes_tags() {
        let services = services_with_cast();
        let q = services
            .questions()
            .ask(
                "maan",
                "  Ownership?  ",
                "What moves?",
                &["Rust".to_string(), "rust ".to_string(), " ".to_string(), "borrowck".to_string()],
            )
            .unwrap();
        assert_eq!(q.title, "Ownership?");
        assert_eq!(q.tags, ["borrowck", "rust"]);
        assert!(q.updated_at.is_none());
    }

    #[test]
    fn test_list_filters() {
        let services = services_with_cast();
        let questions = services.questions();
        questions.ask("maan", "One", "body", &["rust".to_string()]).unwrap();
        questions.ask("priya", "Two", "body", &["go".to_string()]).unwrap();

        assert_eq!(questions.list(None, None).unwrap().len(), 2);
        assert_eq!(questions.list(Some("RUST"), None).unwrap().len(), 1);
        assert_eq!(questions.list(None, Some("priya")).unwrap()[0].title, "Two");
        assert!(questions.list(Some("rust"), Some("priya")).unwrap().is_empty());
    }

    #[test]
    fn test_edit_is_author_only() {
        let services = services_with_cast();
        let (question, _) = seed_thread(&services);
        let questions = services.questions();

        assert_eq!(
            questions
                .edit("priya", question, Some("Hijacked"), None, None)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );

        let edited = questions
            .edit("maan", question, None, Some("Borrowck still confuses me."), Some(&[][..]))
            .unwrap();
        assert_eq!(edited.title, "How do lifetimes work?");
        assert_eq!(edited.body, "Borrowck still confuses me.");
        assert!(edited.tags.is_empty());
        assert!(edited.updated_at.is_some());
    }

    #[test]
    fn test_delete_cascades_reviews() {
        let services = services_with_cast();
        let (question, answer) = seed_thread(&services);
        let reviews = services.reviews();
        reviews
            .submit("alex", ReviewTarget::question(question), 3, None)
            .unwrap();
        let on_answer = reviews
            .submit("alex", ReviewTarget::answer(answer), 4, None)
            .unwrap();
        reviews.update(&on_answer, 5, None).unwrap();

        assert_eq!(
            services.questions().delete("priya", question).unwrap_err().kind(),
            ErrorKind::Forbidden
        );

        let deleted = services.questions().delete("prof", question).unwrap();
        assert_eq!(deleted.answers_removed, 1);
        assert_eq!(deleted.reviews_removed, 3);
        assert!(services.questions().get_optional(question).unwrap().is_none());
        assert!(services.answers().get_optional(answer).unwrap().is_none());
        assert!(reviews.list_by_reviewer("alex").unwrap().is_empty());
    }

    #[test]
    fn test_accept_answer() {
        let services = services_with_cast();
        let (question, answer) = seed_thread(&services);
        let other = services
            .questions()
            .ask("priya", "Unrelated", "body", &[])
            .unwrap();

        assert_eq!(
            services
                .questions()
                .accept_answer("priya", question, answer)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            services
                .questions()
                .accept_answer("priya", other.question_id, answer)
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );

        let accepted = services.questions().accept_answer("maan", question, answer).unwrap();
        assert_eq!(accepted.accepted_answer_id, Some(answer));

        services.answers().delete("priya", answer).unwrap();
        assert!(services.questions().get(question).unwrap().accepted_answer_id.is_none());
    }

    #[test]
    fn test_validation() {
        let services = services_with_cast();
        let questions = services.questions();
        assert_eq!(
            questions.ask("maan", " ", "body", &[]).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            questions
                .ask("maan", &"x".repeat(MAX_TITLE_LEN + 1), "body", &[])
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            questions.ask("ghost", "Title", "body", &[]).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(questions.get(404).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
