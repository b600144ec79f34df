//! Storage contract consumed by the screening flow

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aml_core::{
    Check, CheckHistory, CheckId, CheckStatus, CredentialSet, NewCheck, NewHistory, PendingEntry,
    ProviderCurrency, ProviderId, QueueEntry, RiskLevel, Score, UserId,
};

use crate::error::StoreResult;

/// What a poll does to its Check, applied atomically with the history row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Still pending and below the attempt ceiling: bump the counter.
    ///
    /// A score from a successful interim poll replaces the stored score.
    Retry { score: Option<Score> },
    /// Move the Check to a terminal status and drop its queue entry
    Finalize {
        status: CheckStatus,
        score: Score,
        risk_level: RiskLevel,
    },
}

/// Filters for check listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckFilter {
    pub user_id: Option<UserId>,
    pub provider: Option<ProviderId>,
    pub status: Option<CheckStatus>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
}

/// Result of an invariant audit over the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub checks: u64,
    pub pending: u64,
    pub queued: u64,
    /// Pending checks without a queue entry
    pub pending_without_queue: Vec<CheckId>,
    /// Queue entries whose check is missing or terminal
    pub queued_not_pending: Vec<CheckId>,
    /// Checks whose attempt numbers are not exactly 1..N
    pub history_gaps: Vec<CheckId>,
    /// Queue counters that disagree with the number of history rows
    pub attempt_mismatches: Vec<CheckId>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.pending_without_queue.is_empty()
            && self.queued_not_pending.is_empty()
            && self.history_gaps.is_empty()
            && self.attempt_mismatches.is_empty()
    }
}

/// Persistence for checks, their audit trail and the polling queue.
///
/// Composite operations (`create_screening`, `record_poll`) run inside one
/// transaction each. Implementations never perform network I/O.
#[async_trait]
pub trait ScreeningStore: Send + Sync {
    /// Create a Check with history attempt 1, enqueuing it when pending
    async fn create_screening(&self, check: NewCheck, history: NewHistory) -> StoreResult<Check>;

    /// Queue entries of pending checks, oldest first, joined with their
    /// Check and owner. Entries at or past the attempt ceiling are included
    /// so the poller can finalize them.
    async fn pending_entries(&self, limit: u32) -> StoreResult<Vec<PendingEntry>>;

    /// Append the next history attempt for `entry` and apply `decision`.
    ///
    /// Returns the attempt number written.
    async fn record_poll(
        &self,
        entry: QueueEntry,
        history: NewHistory,
        decision: PollDecision,
    ) -> StoreResult<u32>;

    async fn get_check(&self, id: CheckId) -> StoreResult<Option<Check>>;

    async fn queue_entry(&self, id: CheckId) -> StoreResult<Option<QueueEntry>>;

    /// One page of checks plus the total number of matches
    async fn checks_page(
        &self,
        filter: &CheckFilter,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Check>, u64)>;

    /// History rows for the given checks ordered by check then attempt
    async fn history_for(&self, check_ids: &[CheckId]) -> StoreResult<Vec<CheckHistory>>;

    /// Empty set when the user has none stored for `provider`
    async fn credentials(&self, user_id: UserId, provider: ProviderId)
        -> StoreResult<CredentialSet>;

    /// Replace the stored set for `(user_id, provider)`
    async fn save_credentials(
        &self,
        user_id: UserId,
        provider: ProviderId,
        credentials: &CredentialSet,
    ) -> StoreResult<()>;

    /// Returns whether anything was removed
    async fn delete_credentials(&self, user_id: UserId, provider: ProviderId) -> StoreResult<bool>;

    async fn provider_currency(
        &self,
        provider: ProviderId,
        currency_id: i64,
    ) -> StoreResult<Option<ProviderCurrency>>;

    async fn supported_currencies(&self, provider: ProviderId)
        -> StoreResult<Vec<ProviderCurrency>>;

    async fn upsert_currency(&self, currency: &ProviderCurrency) -> StoreResult<()>;

    async fn upsert_user(&self, user_id: UserId, utc_offset_secs: i32) -> StoreResult<()>;

    /// `None` for unknown users
    async fn user_utc_offset(&self, user_id: UserId) -> StoreResult<Option<i32>>;

    async fn audit(&self) -> StoreResult<AuditReport>;
}
