//! Provider errors

use aml_core::{CredentialKey, ProviderId};
use thiserror::Error;

/// Raw bytes of one provider exchange, kept for the audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExchange {
    pub request: Vec<u8>,
    pub response: Vec<u8>,
}

/// Errors from provider clients, authorizers and the registry
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not registered: {0}")]
    Unregistered(ProviderId),

    #[error("Missing credentials for {provider}: {}", join_keys(.keys))]
    MissingCredentials {
        provider: ProviderId,
        keys: Vec<CredentialKey>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("Provider returned HTTP {status}")]
    Http { status: u16, exchange: RawExchange },

    #[error("Provider rejected request: {message}")]
    Rejected {
        message: String,
        exchange: RawExchange,
    },

    #[error("Failed to decode provider response: {message}")]
    Decode {
        message: String,
        exchange: RawExchange,
    },

    #[error("Unknown provider status: {status}")]
    UnknownStatus {
        status: String,
        exchange: RawExchange,
    },
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// Raw exchange captured before the error, if any bytes went over the wire
    pub fn exchange(&self) -> Option<&RawExchange> {
        match self {
            ProviderError::Http { exchange, .. }
            | ProviderError::Rejected { exchange, .. }
            | ProviderError::Decode { exchange, .. }
            | ProviderError::UnknownStatus { exchange, .. } => Some(exchange),
            _ => None,
        }
    }

    /// Configuration problems are detected before any network call
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProviderError::Unregistered(_) | ProviderError::MissingCredentials { .. }
        )
    }
}

fn join_keys(keys: &[CredentialKey]) -> String {
    keys.iter()
        .map(|k| k.code())
        .collect::<Vec<_>>()
        .join(", ")
}
