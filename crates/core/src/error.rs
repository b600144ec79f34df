//! Parse errors for domain vocabularies

use thiserror::Error;

/// Errors raised when a stored or wire value does not belong to a closed vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown check status: {0}")]
    UnknownStatus(String),

    #[error("Unrecognized risk level: {0}")]
    UnknownRiskLevel(String),

    #[error("Unknown transfer direction: {0}")]
    UnknownDirection(String),

    #[error("Unknown credential key: {0}")]
    UnknownCredentialKey(String),

    #[error("Unknown blockchain family: {0}")]
    UnknownFamily(String),

    #[error("Invalid score {value}: {reason}")]
    InvalidScore { value: String, reason: String },
}
