//! Implementation of `studyhall answers` subcommands.

use anyhow::Result;
use studyhall_core::core::Services;

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, body, format))]
pub fn run_answers_post(
    services: &Services,
    actor: &str,
    question_id: i64,
    body: &str,
    reply_to: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let answer = services.answers().post(actor, question_id, body, reply_to)?;
    Formatter::new(format).print(&answer)
}

pub fn run_answers_list(services: &Services, question_id: i64, format: OutputFormat) -> Result<()> {
    // Surface a missing question instead of an empty list.
    services.questions().get(question_id)?;
    let answers = services.answers().list_for_question(question_id)?;
    Formatter::new(format).print_list(
        &answers,
        "No answers yet",
        "answers",
        &[format!("studyhall answers post {question_id} --body <text>").as_str()],
    )
}

#[tracing::instrument(skip(services, body, format))]
pub fn run_answers_edit(
    services: &Services,
    actor: &str,
    answer_id: i64,
    body: &str,
    format: OutputFormat,
) -> Result<()> {
    let answer = services.answers().edit(actor, answer_id, body)?;
    Formatter::new(format).print(&answer)
}

#[tracing::instrument(skip(services, format))]
pub fn run_answers_delete(
    services: &Services,
    actor: &str,
    answer_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let reviews_removed = services.answers().delete(actor, answer_id)?;
    Formatter::new(format).print_message(&format!(
        "Deleted answer {answer_id} ({reviews_removed} review version(s) removed)"
    ))
}
