//! Screening records: Check, CheckHistory, QueueEntry
//!
//! ```text
//!              terminal result
//!   pending ──────────────────────► success | failed
//!      │                                 ▲
//!      └──── attempts exhausted ─────────┘ (failed, score 0)
//! ```
//!
//! A [`QueueEntry`] exists exactly while its Check is pending.
//! Every provider interaction appends one [`CheckHistory`] row with a
//! gapless attempt number starting at 1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::provider::ProviderId;
use crate::risk::{RiskLevel, Score};

/// Check identifier
pub type CheckId = Uuid;

/// Identifier of the user that owns a check
pub type UserId = i64;

/// Lifecycle status of a Check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Success,
    Failed,
}

impl CheckStatus {
    pub fn code(&self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Success => "success",
            CheckStatus::Failed => "failed",
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckStatus::Pending)
    }

    /// Whether `self -> next` is an allowed transition
    pub fn can_transition_to(&self, next: CheckStatus) -> bool {
        matches!(self, CheckStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CheckStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CheckStatus::Pending),
            "success" => Ok(CheckStatus::Success),
            "failed" => Ok(CheckStatus::Failed),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// Direction of the screened transfer relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" | "in" | "incoming" => Ok(Direction::Deposit),
            "withdrawal" | "out" | "outgoing" => Ok(Direction::Withdrawal),
            _ => Err(CoreError::UnknownDirection(s.to_string())),
        }
    }
}

/// One AML screening record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub user_id: UserId,
    pub provider: ProviderId,
    /// Transaction hash that was screened
    pub tx_id: String,
    pub currency_id: i64,
    pub direction: Direction,
    pub output_address: String,
    /// Identifier assigned by the provider, used for status rechecks
    pub external_id: String,
    pub status: CheckStatus,
    pub score: Score,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Check {
    pub fn is_pending(&self) -> bool {
        self.status == CheckStatus::Pending
    }
}

/// Data for a Check about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheck {
    pub user_id: UserId,
    pub provider: ProviderId,
    pub tx_id: String,
    pub currency_id: i64,
    pub direction: Direction,
    pub output_address: String,
    pub external_id: String,
    pub status: CheckStatus,
    pub score: Score,
    pub risk_level: RiskLevel,
}

/// One immutable audit row per provider interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckHistory {
    pub id: i64,
    pub check_id: CheckId,
    /// Bytes exactly as sent to the provider
    pub request: Vec<u8>,
    /// Bytes exactly as received from the provider
    pub response: Vec<u8>,
    pub error: Option<String>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

/// History row about to be appended; the store assigns the attempt number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewHistory {
    pub request: Vec<u8>,
    pub response: Vec<u8>,
    pub error: Option<String>,
}

impl NewHistory {
    pub fn success(request: Vec<u8>, response: Vec<u8>) -> Self {
        Self {
            request,
            response,
            error: None,
        }
    }

    pub fn failure(request: Vec<u8>, response: Vec<u8>, error: impl Into<String>) -> Self {
        Self {
            request,
            response,
            error: Some(error.into()),
        }
    }
}

/// Marks a Check as awaiting asynchronous status resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub check_id: CheckId,
    /// Provider interactions recorded so far (the initial check counts as 1)
    pub attempts: u32,
}

impl QueueEntry {
    /// Attempt number the next poll will be recorded under
    pub fn next_attempt(&self) -> u32 {
        self.attempts + 1
    }
}

/// A queue entry joined with its Check and owning user
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub entry: QueueEntry,
    pub check: Check,
    pub user_utc_offset_secs: i32,
}
