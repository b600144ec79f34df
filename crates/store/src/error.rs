//! Store errors

use aml_core::{CheckId, CoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored value rejected: {0}")]
    Vocabulary(#[from] CoreError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Check {0} has no queue entry")]
    NotQueued(CheckId),

    #[error("Queue entry for check {check_id} is stale: expected {expected} attempts, found {found}")]
    StaleEntry {
        check_id: CheckId,
        expected: u32,
        found: u32,
    },

    #[error("Check {0} is no longer pending")]
    NotPending(CheckId),
}

pub type StoreResult<T> = Result<T, StoreError>;
