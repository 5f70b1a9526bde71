//! Implementation of `studyhall questions` subcommands.

use anyhow::Result;
use serde::Serialize;
use studyhall_core::core::Services;
use studyhall_core::model::{Answer, Question};

use crate::output::{Formatter, OutputFormat};

/// A question with its answers in thread order.
#[derive(Debug, Serialize)]
struct QuestionThread {
    #[serde(flatten)]
    question: Question,
    answers: Vec<Answer>,
}

#[tracing::instrument(skip(services, body, format))]
pub fn run_questions_ask(
    services: &Services,
    actor: &str,
    title: &str,
    body: &str,
    tags: &[String],
    format: OutputFormat,
) -> Result<()> {
    let question = services.questions().ask(actor, title, body, tags)?;
    Formatter::new(format).print(&question)
}

pub fn run_questions_show(
    services: &Services,
    question_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let question = services.questions().get(question_id)?;
    let answers = services.answers().list_for_question(question_id)?;
    Formatter::new(format).print(&QuestionThread { question, answers })
}

pub fn run_questions_list(
    services: &Services,
    tag: Option<&str>,
    author: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let questions = services.questions().list(tag, author)?;
    Formatter::new(format).print_list(
        &questions,
        "No questions found",
        "questions",
        &["studyhall questions show <id>", "studyhall questions ask --title <t> --body <b>"],
    )
}

#[tracing::instrument(skip(services, body, format))]
pub fn run_questions_edit(
    services: &Services,
    actor: &str,
    question_id: i64,
    title: Option<&str>,
    body: Option<&str>,
    tags: Option<&[String]>,
    format: OutputFormat,
) -> Result<()> {
    let question = services
        .questions()
        .edit(actor, question_id, title, body, tags)?;
    Formatter::new(format).print(&question)
}

#[tracing::instrument(skip(services, format))]
pub fn run_questions_delete(
    services: &Services,
    actor: &str,
    question_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let deleted = services.questions().delete(actor, question_id)?;
    Formatter::new(format).print(&deleted)
}

#[tracing::instrument(skip(services, format))]
pub fn run_questions_accept(
    services: &Services,
    actor: &str,
    question_id: i64,
    answer_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let question = services
        .questions()
        .accept_answer(actor, question_id, answer_id)?;
    Formatter::new(format).print(&question)
}
