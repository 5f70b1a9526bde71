//! Typed error types for the studyhall-core service layer.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::model::{FlagKind, ReviewTarget, Role};

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`], for callers that only need to
/// pick a message style or an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Forbidden,
    Concurrency,
    Storage,
}

/// Errors that can occur in the studyhall-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The data directory has not been initialized.
    #[error("No studyhall database at {path}. Run 'studyhall init' first.")]
    NotInitialized { path: String },

    /// An input failed validation (rating, weight, blank field, ...).
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Review not found: {review_id}")]
    ReviewNotFound { review_id: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("{student} does not trust {reviewer}")]
    TrustNotFound { student: String, reviewer: String },

    /// The item has never been flagged.
    #[error("No flags on {kind} {item_id}")]
    FlagNotFound { kind: FlagKind, item_id: i64 },

    #[error("Question not found: {question_id}")]
    QuestionNotFound { question_id: i64 },

    #[error("Answer not found: {answer_id}")]
    AnswerNotFound { answer_id: i64 },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: i64 },

    /// The review target (question or answer) does not exist.
    #[error("Review target not found: {target}")]
    TargetNotFound { target: ReviewTarget },

    #[error("User already exists: {username}")]
    UserAlreadyExists { username: String },

    /// A latest review already exists for the (reviewer, target) pair.
    #[error("{reviewer} already reviewed {target} (latest: {review_id}); update it instead")]
    ReviewAlreadyExists {
        reviewer: String,
        target: ReviewTarget,
        review_id: String,
    },

    /// The acting user lacks the role needed for an action.
    #[error("{username} needs the '{required}' role to {action}")]
    MissingRole {
        username: String,
        required: Role,
        action: &'static str,
    },

    /// The acting user does not own the content they tried to change.
    #[error("{username} is not allowed to {action}")]
    Forbidden {
        username: String,
        action: String,
    },

    /// A concurrent writer changed the rows this operation depended on.
    #[error("Concurrent modification: {detail}")]
    Concurrency { detail: String },

    /// An internal storage or database error.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wrap a store error, promoting lock contention to [`CoreError::Concurrency`].
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        if let Some(code) = sqlite_code(&err) {
            if matches!(code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
                return Self::Concurrency {
                    detail: format!("database is busy: {err:#}"),
                };
            }
        }
        Self::Storage(err)
    }

    /// Classify this error into the coarse taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotInitialized { .. }
            | Self::ReviewNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::TrustNotFound { .. }
            | Self::FlagNotFound { .. }
            | Self::QuestionNotFound { .. }
            | Self::AnswerNotFound { .. }
            | Self::MessageNotFound { .. }
            | Self::TargetNotFound { .. } => ErrorKind::NotFound,
            Self::UserAlreadyExists { .. } | Self::ReviewAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::MissingRole { .. } | Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Concurrency { .. } => ErrorKind::Concurrency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Find the SQLite primary result code anywhere in an error chain.
pub(crate) fn sqlite_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| match cause.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => Some(e.code),
        _ => None,
    })
}

/// Whether an error chain contains a UNIQUE index violation.
///
/// Primary-key collisions report a different extended code and are not
/// matched.
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    })
}
