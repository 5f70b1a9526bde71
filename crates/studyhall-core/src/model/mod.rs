//! Domain types for studyhall.
//!
//! Everything here is plain data: rows as they come out of the store, plus the
//! small enums that name review targets, roles, and flag kinds. All types
//! serialize with serde so the CLI can render them as text or JSON.

pub mod ids;

pub use ids::{is_review_id, new_flag_id, new_review_id};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest accepted review rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted review rating.
pub const MAX_RATING: u8 = 5;
/// Lowest accepted trust weight.
pub const MIN_WEIGHT: u8 = 1;
/// Highest accepted trust weight.
pub const MAX_WEIGHT: u8 = 5;

// ============================================================================
// Review targets
// ============================================================================

/// Kind of content a review is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Question,
    Answer,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "question" | "q" => Ok(Self::Question),
            "answer" | "a" => Ok(Self::Answer),
            other => Err(format!("unknown target type '{other}' (expected question or answer)")),
        }
    }
}

/// A reviewable piece of content: a question or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewTarget {
    pub kind: TargetKind,
    pub id: i64,
}

impl ReviewTarget {
    #[must_use]
    pub const fn question(id: i64) -> Self {
        Self {
            kind: TargetKind::Question,
            id,
        }
    }

    #[must_use]
    pub const fn answer(id: i64) -> Self {
        Self {
            kind: TargetKind::Answer,
            id,
        }
    }
}

impl fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Parses `question:12` / `answer:2002` (also `q:12`, `a:2002`).
impl FromStr for ReviewTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid target '{s}' (expected e.g. answer:2002)"))?;
        let kind = kind.parse::<TargetKind>()?;
        let id = id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid target id '{id}' in '{s}'"))?;
        Ok(Self { kind, id })
    }
}

// ============================================================================
// Reviews
// ============================================================================

/// One version of a reviewer's review of a target.
///
/// Versions are never edited in place. An update inserts a new row whose
/// `previous_review_id` points at the version it supersedes; only
/// `is_latest` ever changes on an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub reviewer: String,
    pub target_type: TargetKind,
    pub target_id: i64,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_review_id: Option<String>,
    pub is_latest: bool,
}

impl Review {
    #[must_use]
    pub const fn target(&self) -> ReviewTarget {
        ReviewTarget {
            kind: self.target_type,
            id: self.target_id,
        }
    }

    /// Whether `rating`/`comment` would produce an identical version.
    #[must_use]
    pub fn has_same_content(&self, rating: u8, comment: Option<&str>) -> bool {
        self.rating == rating && self.comment.as_deref() == comment
    }
}

// ============================================================================
// Trust
// ============================================================================

/// A student's trust in one reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEntry {
    pub student: String,
    pub reviewer: String,
    pub weight: u8,
    pub has_unseen_update: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Flags
// ============================================================================

/// Kind of item a moderation flag points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "UPPERCASE")]
pub enum FlagKind {
    Question,
    Answer,
    Message,
}

impl FlagKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "QUESTION",
            Self::Answer => "ANSWER",
            Self::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUESTION" => Ok(Self::Question),
            "ANSWER" => Ok(Self::Answer),
            "MESSAGE" => Ok(Self::Message),
            other => Err(format!("unknown flag type '{other}'")),
        }
    }
}

/// A moderation report. Append-only; `resolved` only moves false → true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub flag_id: String,
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub item_id: i64,
    pub flagged_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Users
// ============================================================================

/// Platform role. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Reviewer,
    Instructor,
    Staff,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Reviewer => "reviewer",
            Self::Instructor => "instructor",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    /// Roles allowed to file and resolve moderation flags.
    #[must_use]
    pub const fn can_moderate(self) -> bool {
        matches!(self, Self::Staff | Self::Instructor | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "reviewer" => Ok(Self::Reviewer),
            "instructor" => Ok(Self::Instructor),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A registered user and their roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: i64,
    pub author: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_answer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer_id: i64,
    pub question_id: i64,
    /// Answer this one replies to, for threaded discussion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_answer_id: Option<i64>,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub sender: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<i64>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}
