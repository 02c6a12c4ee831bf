use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: String,
    pub user_id: String,
    pub version: i32,
    pub document: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeVersionRow {
    pub id: Uuid,
    pub resume_id: String,
    pub version: i32,
    pub snapshot: Value,
    pub snapshot_at: DateTime<Utc>,
}

/// Lifecycle status of a resume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    Draft,
    Published,
    Archived,
    Pending,
    Approved,
    Rejected,
}

impl ResumeStatus {
    pub const NAMES: &'static [&'static str] = &[
        "draft",
        "published",
        "archived",
        "pending",
        "approved",
        "rejected",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResumeStatus::Draft => "draft",
            ResumeStatus::Published => "published",
            ResumeStatus::Archived => "archived",
            ResumeStatus::Pending => "pending",
            ResumeStatus::Approved => "approved",
            ResumeStatus::Rejected => "rejected",
        }
    }
}

/// Outcome of an administrator's review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const NAMES: &'static [&'static str] = &["pending", "approved", "rejected"];

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// The resume status mirrored from a review decision.
    pub fn resume_status(self) -> ResumeStatus {
        match self {
            ApprovalStatus::Pending => ResumeStatus::Pending,
            ApprovalStatus::Approved => ResumeStatus::Approved,
            ApprovalStatus::Rejected => ResumeStatus::Rejected,
        }
    }
}
