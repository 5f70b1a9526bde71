//! Implementation of `studyhall messages` subcommands.

use anyhow::Result;
use studyhall_core::core::Services;

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, body, format))]
pub fn run_messages_send(
    services: &Services,
    actor: &str,
    recipient: &str,
    body: &str,
    question_id: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let message = services.messages().send(actor, recipient, body, question_id)?;
    Formatter::new(format).print(&message)
}

pub fn run_messages_inbox(
    services: &Services,
    actor: &str,
    unread_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let messages = services.messages().inbox(actor, unread_only)?;
    Formatter::new(format).print_list(
        &messages,
        if unread_only { "No unread messages" } else { "No messages" },
        "messages",
        &["studyhall messages read <id>"],
    )
}

pub fn run_messages_read(
    services: &Services,
    actor: &str,
    message_id: i64,
    format: OutputFormat,
) -> Result<()> {
    if !services.messages().mark_read(message_id, actor)? {
        tracing::debug!(message_id, "already read");
    }
    let message = services.messages().get(message_id)?;
    Formatter::new(format).print(&message)
}
