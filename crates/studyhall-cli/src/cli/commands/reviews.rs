//! Implementation of `studyhall reviews` subcommands.

use anyhow::{bail, Result};
use studyhall_core::core::Services;
use studyhall_core::model::{is_review_id, ReviewTarget};

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, comment, format))]
pub fn run_reviews_submit(
    services: &Services,
    actor: &str,
    target: ReviewTarget,
    rating: u8,
    comment: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let review = services.reviews().submit(actor, target, rating, comment)?;
    Formatter::new(format).print(&review)
}

/// Post a new version on top of the actor's current latest.
#[tracing::instrument(skip(services, comment, format))]
pub fn run_reviews_update(
    services: &Services,
    actor: &str,
    target: ReviewTarget,
    rating: u8,
    comment: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let reviews = services.reviews();
    let Some(existing) = reviews.latest_for(actor, target)? else {
        bail!(
            "{actor} has no review of {target}\n  \
             To fix: studyhall reviews submit {target} --rating <1-5>"
        );
    };
    let write = reviews.update(&existing, rating, comment)?;
    if !write.created {
        tracing::debug!(review_id = %write.review.review_id, "content unchanged");
    }
    Formatter::new(format).print(&write)
}

#[tracing::instrument(skip(services, comment, format))]
pub fn run_reviews_save(
    services: &Services,
    actor: &str,
    target: ReviewTarget,
    rating: u8,
    comment: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let write = services.reviews().save(actor, target, rating, comment)?;
    Formatter::new(format).print(&write)
}

pub fn run_reviews_show(services: &Services, review_id: &str, format: OutputFormat) -> Result<()> {
    require_review_id(review_id)?;
    let review = services.reviews().get(review_id)?;
    Formatter::new(format).print(&review)
}

pub fn run_reviews_latest(
    services: &Services,
    reviewer: &str,
    target: ReviewTarget,
    format: OutputFormat,
) -> Result<()> {
    match services.reviews().latest_for(reviewer, target)? {
        Some(review) => Formatter::new(format).print(&review),
        None => bail!(
            "{reviewer} has not reviewed {target}\n  To fix: studyhall reviews list {target}"
        ),
    }
}

pub fn run_reviews_history(
    services: &Services,
    reviewer: &str,
    target: ReviewTarget,
    format: OutputFormat,
) -> Result<()> {
    let history = services.reviews().history_for(reviewer, target)?;
    Formatter::new(format).print_list(
        &history,
        &format!("{reviewer} has not reviewed {target}"),
        "versions",
        &[format!("studyhall reviews latest {target} --reviewer {reviewer}").as_str()],
    )
}

/// Latest reviews of a target, or only those from `student`'s trusted
/// reviewers when `student` is set.
pub fn run_reviews_list_target(
    services: &Services,
    target: ReviewTarget,
    student: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = Formatter::new(format);
    match student {
        Some(student) => formatter.print(&services.reviews().trusted_feed(student, target)?),
        None => formatter.print(&services.reviews().list_for_target(target)?),
    }
}

pub fn run_reviews_list_reviewer(
    services: &Services,
    reviewer: &str,
    format: OutputFormat,
) -> Result<()> {
    let reviews = services.reviews().list_by_reviewer(reviewer)?;
    Formatter::new(format).print_list(
        &reviews,
        &format!("{reviewer} has no reviews"),
        "reviews",
        &["studyhall reviews history <target> --reviewer <name>"],
    )
}

#[tracing::instrument(skip(services, format))]
pub fn run_reviews_delete(
    services: &Services,
    actor: &str,
    review_id: &str,
    format: OutputFormat,
) -> Result<()> {
    require_review_id(review_id)?;
    if !services.reviews().delete_history_as(actor, review_id)? {
        bail!("Review not found: {review_id}\n  To fix: studyhall reviews history <target>");
    }
    Formatter::new(format).print_message(&format!(
        "Deleted {review_id} and every earlier version"
    ))
}

fn require_review_id(review_id: &str) -> Result<()> {
    if !is_review_id(review_id) {
        bail!(
            "'{review_id}' is not a review id (expected rv-xxxxxxxx)\n  \
             To fix: studyhall reviews history <target>"
        );
    }
    Ok(())
}
