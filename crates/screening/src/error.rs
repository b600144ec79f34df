//! Screening errors

use aml_core::{BlockchainFamily, CoreError, ProviderId};
use aml_providers::ProviderError;
use aml_store::StoreError;
use thiserror::Error;

/// Errors from the screening flow
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Currency {currency_id} not supported by {provider}")]
    CurrencyNotSupported {
        provider: ProviderId,
        currency_id: i64,
    },

    #[error("Invalid {family} address: {address}")]
    InvalidAddress {
        address: String,
        family: BlockchainFamily,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Domain error: {0}")]
    Domain(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ScreeningError {
    /// Rejected before any provider call was made
    pub fn is_pre_network(&self) -> bool {
        match self {
            ScreeningError::UnsupportedProvider(_)
            | ScreeningError::CurrencyNotSupported { .. }
            | ScreeningError::InvalidAddress { .. }
            | ScreeningError::InvalidInput(_)
            | ScreeningError::Config(_) => true,
            ScreeningError::Provider(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Result type for screening operations
pub type ScreeningResult<T> = Result<T, ScreeningError>;
