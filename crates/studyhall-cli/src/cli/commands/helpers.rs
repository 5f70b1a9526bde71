//! Shared helpers for CLI commands.

use anyhow::Result;
use studyhall_core::core::{CoreContext, CoreError, Services};
use studyhall_core::model::Role;

/// Open the database for a command, failing if `init` has not run.
pub fn open_services(ctx: &CoreContext) -> Result<Services> {
    Ok(ctx.services()?)
}

/// Append a "To fix" line to errors the user can act on.
#[must_use]
pub fn add_fix_hint(err: anyhow::Error) -> anyhow::Error {
    let Some(core) = err.downcast_ref::<CoreError>() else {
        return err;
    };
    match fix_hint(core) {
        Some(hint) => anyhow::anyhow!("{core}\n  To fix: {hint}"),
        None => err,
    }
}

fn fix_hint(err: &CoreError) -> Option<String> {
    let hint = match err {
        CoreError::NotInitialized { .. } => "studyhall init".to_string(),
        CoreError::UserNotFound { .. } => {
            "studyhall --as <admin> users register <username> --role <role>".to_string()
        }
        CoreError::ReviewNotFound { .. } => "studyhall reviews history <target>".to_string(),
        CoreError::ReviewAlreadyExists { target, .. } => {
            format!("studyhall reviews update {target} --rating <1-5>")
        }
        CoreError::MissingRole {
            required: Role::Admin,
            ..
        } => "ask an admin to run this command".to_string(),
        CoreError::MissingRole {
            username, required, ..
        } => format!("studyhall --as <admin> users grant {username} {required}"),
        CoreError::Concurrency { .. } => concat!(
            "another writer got there first; ",
            "re-read with 'studyhall reviews latest <target>' and retry"
        )
        .to_string(),
        CoreError::TrustNotFound { reviewer, .. } => {
            format!("studyhall trust add {reviewer} --weight <1-5>")
        }
        CoreError::FlagNotFound { kind, item_id } => {
            format!("studyhall flags status {kind} {item_id}")
        }
        _ => return None,
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhall_core::model::ReviewTarget;

    #[test]
    fn test_hint_added_for_missing_role() {
        let err = anyhow::Error::from(CoreError::MissingRole {
            username: "maan".to_string(),
            required: Role::Reviewer,
            action: "submit reviews",
        });
        let msg = add_fix_hint(err).to_string();
        assert!(msg.starts_with("maan needs the 'reviewer' role"));
        assert!(msg.contains("To fix: studyhall --as <admin> users grant maan reviewer"));
    }

    #[test]
    fn test_missing_admin_hint_does_not_suggest_self_grant() {
        let err = anyhow::Error::from(CoreError::MissingRole {
            username: "maan".to_string(),
            required: Role::Admin,
            action: "change roles",
        });
        let msg = add_fix_hint(err).to_string();
        assert!(msg.contains("To fix: ask an admin"));
        assert!(!msg.contains("users grant"));
    }

    #[test]
    fn test_hint_mentions_target_for_existing_review() {
        let err = anyhow::Error::from(CoreError::ReviewAlreadyExists {
            reviewer: "alex".to_string(),
            target: ReviewTarget::answer(7),
            review_id: "rv-00000001".to_string(),
        });
        assert!(add_fix_hint(err)
            .to_string()
            .contains("studyhall reviews update answer:7"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let msg = add_fix_hint(anyhow::anyhow!("disk on fire")).to_string();
        assert_eq!(msg, "disk on fire");
    }
}
