//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use studyhall_core::model::{FlagKind, ReviewTarget, Role};

use crate::output::OutputFormat;

pub mod commands;

/// Campus Q&A with versioned peer reviews, trusted reviewers and moderation
#[derive(Parser, Debug)]
#[command(name = "studyhall")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Act as this user (default: $STUDYHALL_USER, then default_user in config)
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    pub as_user: Option<String>,

    /// Database file (default: .studyhall/studyhall.db, or $STUDYHALL_DB)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `--json` wins over `--format`.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format.unwrap_or_default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database in .studyhall/
    Init,

    /// Check review chains, trust weights and flags for integrity problems
    Doctor,

    /// Manage users and roles
    #[command(subcommand)]
    Users(UsersCommands),

    /// Ask and manage questions
    #[command(subcommand)]
    Questions(QuestionsCommands),

    /// Post and manage answers
    #[command(subcommand)]
    Answers(AnswersCommands),

    /// Submit, update and inspect versioned reviews
    #[command(subcommand)]
    Reviews(ReviewsCommands),

    /// Manage your trusted reviewers
    #[command(subcommand)]
    Trust(TrustCommands),

    /// File and resolve moderation flags
    #[command(subcommand)]
    Flags(FlagsCommands),

    /// Send and read direct messages
    #[command(subcommand)]
    Messages(MessagesCommands),

    /// Show what needs your attention
    Inbox,
}

// ============================================================================
// Users subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Register a new user (admins only; the first user registers themselves as admin)
    Register {
        username: String,

        /// Role to grant (repeatable)
        #[arg(long = "role", value_enum, required = true)]
        roles: Vec<Role>,
    },

    /// Show a user and their roles
    Show { username: String },

    /// List users
    List {
        /// Only users holding this role
        #[arg(long, value_enum)]
        role: Option<Role>,
    },

    /// Grant a role (admins only)
    Grant {
        username: String,
        #[arg(value_enum)]
        role: Role,
    },

    /// Revoke a role (admins only)
    Revoke {
        username: String,
        #[arg(value_enum)]
        role: Role,
    },
}

// ============================================================================
// Questions subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum QuestionsCommands {
    /// Ask a question
    Ask {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show a question with its answers
    Show { question_id: i64 },

    /// List questions, newest first
    List {
        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        author: Option<String>,
    },

    /// Edit your question
    Edit {
        question_id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        body: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag", conflicts_with = "clear_tags")]
        tags: Vec<String>,

        /// Remove all tags
        #[arg(long)]
        clear_tags: bool,
    },

    /// Delete a question, its answers and their reviews
    Delete { question_id: i64 },

    /// Accept an answer to your question
    Accept { question_id: i64, answer_id: i64 },
}

// ============================================================================
// Answers subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum AnswersCommands {
    /// Answer a question
    Post {
        question_id: i64,

        #[arg(long)]
        body: String,

        /// Reply to another answer on the same question
        #[arg(long, value_name = "ANSWER_ID")]
        reply_to: Option<i64>,
    },

    /// List answers to a question in thread order
    List { question_id: i64 },

    /// Edit your answer
    Edit {
        answer_id: i64,

        #[arg(long)]
        body: String,
    },

    /// Delete an answer and its reviews
    Delete { answer_id: i64 },
}

// ============================================================================
// Reviews subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ReviewsCommands {
    /// Submit your first review of a target (e.g. answer:2002)
    Submit {
        target: ReviewTarget,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Post a new version of your review of a target
    Update {
        target: ReviewTarget,

        #[arg(long)]
        rating: u8,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Submit or update, whichever applies
    Save {
        target: ReviewTarget,

        #[arg(long)]
        rating: u8,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Show one review version
    Show { review_id: String },

    /// Show the latest version of a review
    Latest {
        target: ReviewTarget,

        /// Reviewer (default: you)
        #[arg(long)]
        reviewer: Option<String>,
    },

    /// Show every version of a review, oldest first
    History {
        target: ReviewTarget,

        /// Reviewer (default: you)
        #[arg(long)]
        reviewer: Option<String>,
    },

    /// List latest reviews of a target, or by a reviewer
    List {
        /// Target to list reviews of
        #[arg(required_unless_present = "reviewer")]
        target: Option<ReviewTarget>,

        /// List a reviewer's latest reviews instead
        #[arg(long, conflicts_with_all = ["target", "trusted"])]
        reviewer: Option<String>,

        /// Only your trusted reviewers, with a weighted rating
        #[arg(long)]
        trusted: bool,
    },

    /// Delete a review version and everything before it
    Delete { review_id: String },
}

// ============================================================================
// Trust subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TrustCommands {
    /// Trust a reviewer, or change their weight
    Add {
        reviewer: String,

        /// Weight from 1 to 5
        #[arg(long, default_value_t = 3)]
        weight: u8,
    },

    /// Stop trusting a reviewer
    Remove { reviewer: String },

    /// List your trusted reviewers
    List,

    /// List trusted reviewers with updates you have not seen
    Updated,

    /// Open a reviewer's profile (clears their update marker)
    View { reviewer: String },
}

// ============================================================================
// Flags subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum FlagsCommands {
    /// Flag a question, answer or message
    File {
        #[arg(value_enum, ignore_case = true)]
        kind: FlagKind,
        item_id: i64,

        #[arg(long)]
        reason: String,
    },

    /// Resolve every open flag on an item
    Resolve {
        #[arg(value_enum, ignore_case = true)]
        kind: FlagKind,
        item_id: i64,
    },

    /// Show flag counts for an item
    Status {
        #[arg(value_enum, ignore_case = true)]
        kind: FlagKind,
        item_id: i64,
    },

    /// List unresolved flags, or all flags on one item id
    List {
        /// Item id to list flags for
        #[arg(long)]
        item: Option<i64>,

        /// Narrow --item to one type
        #[arg(long = "type", value_enum, ignore_case = true, requires = "item")]
        kind: Option<FlagKind>,
    },
}

// ============================================================================
// Messages subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum MessagesCommands {
    /// Send a message
    Send {
        recipient: String,

        #[arg(long)]
        body: String,

        /// Question this message is about
        #[arg(long)]
        question: Option<i64>,
    },

    /// List messages you received
    Inbox {
        #[arg(long)]
        unread: bool,
    },

    /// Mark a message read
    Read { message_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_review_submit() {
        let cli = Cli::try_parse_from([
            "studyhall", "--as", "alex", "reviews", "submit", "answer:2002", "--rating", "2",
            "--comment", "Needs work",
        ])
        .unwrap();
        assert_eq!(cli.as_user.as_deref(), Some("alex"));
        match cli.command {
            Commands::Reviews(ReviewsCommands::Submit {
                target,
                rating,
                comment,
            }) => {
                assert_eq!(target, ReviewTarget::answer(2002));
                assert_eq!(rating, 2);
                assert_eq!(comment.as_deref(), Some("Needs work"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_target_rejected() {
        assert!(Cli::try_parse_from(["studyhall", "reviews", "latest", "comment:1"]).is_err());
    }

    #[test]
    fn test_output_format_resolution() {
        let cli = Cli::try_parse_from(["studyhall", "--json", "inbox"]).unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Json);
        let cli = Cli::try_parse_from(["studyhall", "inbox", "--format", "json"]).unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Json);
        let cli = Cli::try_parse_from(["studyhall", "inbox"]).unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Text);
    }

    #[test]
    fn test_flag_kind_ignores_case() {
        let cli = Cli::try_parse_from(["studyhall", "flags", "status", "QUESTION", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Flags(FlagsCommands::Status {
                kind: FlagKind::Question,
                item_id: 3
            })
        ));
    }

    #[test]
    fn test_flags_parse_kind() {
        let cli =
            Cli::try_parse_from(["studyhall", "flags", "resolve", "answer", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Flags(FlagsCommands::Resolve {
                kind: FlagKind::Answer,
                item_id: 12
            })
        ));
    }
}
