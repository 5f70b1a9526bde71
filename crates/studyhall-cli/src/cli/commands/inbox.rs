//! Implementation of `studyhall inbox`.

use anyhow::Result;
use studyhall_core::core::Services;

use crate::output::{Formatter, OutputFormat};

/// Summarize unseen reviewer updates, unread messages and open flags
/// against the actor's content.
pub fn run_inbox(services: &Services, actor: &str, format: OutputFormat) -> Result<()> {
    let summary = services.inbox().summary(actor)?;
    let formatter = Formatter::new(format);
    if format == OutputFormat::Text && summary.is_empty() {
        return formatter.print_message("Nothing new");
    }
    formatter.print(&summary)
}
