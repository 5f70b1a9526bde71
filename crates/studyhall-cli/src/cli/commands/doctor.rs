//! Implementation of `studyhall doctor`.

use anyhow::Result;
use studyhall_core::core::CoreContext;

use super::helpers::open_services;
use crate::output::{Formatter, OutputFormat};

/// Print the integrity report; exits with status 1 if any check fails.
#[tracing::instrument(skip(ctx, format))]
pub fn run_doctor(ctx: &CoreContext, format: OutputFormat) -> Result<()> {
    let services = open_services(ctx)?;
    let report = services.doctor().run()?;

    Formatter::new(format).print(&report)?;

    if !report.healthy {
        std::process::exit(1);
    }
    Ok(())
}
