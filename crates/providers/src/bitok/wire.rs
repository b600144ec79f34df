//! Wire format

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::client::ProviderStatus;

/// Body of `POST /v1/manual-checks/check-transfer/`
#[derive(Debug, Serialize)]
pub(super) struct CheckTransferRequest<'a> {
    pub direction: &'a str,
    pub network: &'a str,
    pub tx_hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<&'a str>,
    pub output_address: &'a str,
}

/// Manual check as returned by create and status calls
#[derive(Debug, Deserialize)]
pub(super) struct ManualCheck {
    pub id: u64,
    pub check_status: String,
    #[serde(default)]
    pub risk_level: Option<String>,
    /// Native scale 0..100
    #[serde(default)]
    pub risk_score: Option<Decimal>,
}

/// Error envelope some endpoints return with a 2xx status
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unspecified provider error".to_string(),
        }
    }
}

pub(super) fn direction(direction: aml_core::Direction) -> &'static str {
    match direction {
        aml_core::Direction::Deposit => "incoming",
        aml_core::Direction::Withdrawal => "outgoing",
    }
}

pub(super) fn parse_status(raw: &str) -> Option<ProviderStatus> {
    match raw.trim().to_lowercase().as_str() {
        "new" | "queued" | "checking" => Some(ProviderStatus::Pending),
        "checked" => Some(ProviderStatus::Success),
        "error" => Some(ProviderStatus::Failure),
        _ => None,
    }
}

/// Map provider risk words onto the shared vocabulary.
///
/// Unknown words pass through unchanged so the caller rejects them.
pub(super) fn risk_word(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "severe" => "critical".to_string(),
        "no_risk" => "none".to_string(),
        other => other.to_string(),
    }
}
