//! Implementation of `studyhall trust` subcommands.

use anyhow::Result;
use studyhall_core::core::Services;

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, format))]
pub fn run_trust_add(
    services: &Services,
    student: &str,
    reviewer: &str,
    weight: u8,
    format: OutputFormat,
) -> Result<()> {
    let entry = services.trust().add_or_update(student, reviewer, weight)?;
    Formatter::new(format).print(&entry)
}

#[tracing::instrument(skip(services, format))]
pub fn run_trust_remove(
    services: &Services,
    student: &str,
    reviewer: &str,
    format: OutputFormat,
) -> Result<()> {
    let message = if services.trust().remove(student, reviewer)? {
        format!("{student} no longer trusts {reviewer}")
    } else {
        format!("{student} did not trust {reviewer}")
    };
    Formatter::new(format).print_message(&message)
}

pub fn run_trust_list(services: &Services, student: &str, format: OutputFormat) -> Result<()> {
    let entries = services.trust().entries(student)?;
    Formatter::new(format).print_list(
        &entries,
        "You do not trust any reviewers yet",
        "trusted",
        &["studyhall trust add <reviewer> --weight <1-5>"],
    )
}

pub fn run_trust_updated(services: &Services, student: &str, format: OutputFormat) -> Result<()> {
    let updated: Vec<String> = services.trust().list_updated(student)?.into_iter().collect();
    Formatter::new(format).print_list(
        &updated,
        "No unseen reviewer updates",
        "updated",
        &["studyhall trust view <reviewer>"],
    )
}

/// Show a reviewer's latest reviews and clear the student's update marker.
pub fn run_trust_view(
    services: &Services,
    student: &str,
    reviewer: &str,
    format: OutputFormat,
) -> Result<()> {
    let profile = services.trust().view_profile(student, reviewer)?;
    Formatter::new(format).print(&profile)
}
