//! Implementation of `studyhall init`.

use anyhow::Result;
use studyhall_core::core::CoreContext;

use crate::output::{Formatter, OutputFormat};

/// Create the database and schema. Safe to run twice.
#[tracing::instrument(skip(ctx, format), fields(path = %ctx.db_path().display()))]
pub fn run_init(ctx: &CoreContext, format: OutputFormat) -> Result<()> {
    let created = ctx.initialize()?;
    let message = if created {
        format!("Initialized studyhall in {}", ctx.db_path().display())
    } else {
        format!("Already initialized: {}", ctx.db_path().display())
    };
    Formatter::new(format).print_message(&message)
}
