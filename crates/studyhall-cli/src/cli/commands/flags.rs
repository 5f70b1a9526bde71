//! Implementation of `studyhall flags` subcommands.

use anyhow::Result;
use studyhall_core::core::Services;
use studyhall_core::model::FlagKind;

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, reason, format))]
pub fn run_flags_file(
    services: &Services,
    actor: &str,
    kind: FlagKind,
    item_id: i64,
    reason: &str,
    format: OutputFormat,
) -> Result<()> {
    let flag = services.flags().file(kind, item_id, actor, reason)?;
    Formatter::new(format).print(&flag)
}

#[tracing::instrument(skip(services, format))]
pub fn run_flags_resolve(
    services: &Services,
    actor: &str,
    kind: FlagKind,
    item_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let resolved = services.flags().resolve(item_id, kind, actor)?;
    let message = if resolved == 0 {
        format!("{kind} {item_id} has no open flags")
    } else {
        format!("Resolved {resolved} flag(s) on {kind} {item_id}")
    };
    Formatter::new(format).print_message(&message)
}

pub fn run_flags_status(
    services: &Services,
    kind: FlagKind,
    item_id: i64,
    format: OutputFormat,
) -> Result<()> {
    let status = services.flags().status(item_id, kind)?;
    Formatter::new(format).print(&status)
}

/// Open flags everywhere, or every flag on one item id.
pub fn run_flags_list(
    services: &Services,
    item_id: Option<i64>,
    kind: Option<FlagKind>,
    format: OutputFormat,
) -> Result<()> {
    let flags = match item_id {
        Some(item_id) => services.flags().list_by_item(item_id, kind)?,
        None => services.flags().list_unresolved()?,
    };
    Formatter::new(format).print_list(
        &flags,
        "No flags",
        "flags",
        &["studyhall flags resolve <type> <id>"],
    )
}
