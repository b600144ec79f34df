//! Wire format

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::client::ProviderStatus;

/// Top-level response envelope; `result: false` is a provider-level failure
#[derive(Debug, Deserialize)]
pub(super) struct Envelope {
    pub result: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: Option<CheckData>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckData {
    pub uid: String,
    pub status: String,
    /// Native scale 0..1
    #[serde(default)]
    pub riskscore: Option<Decimal>,
    #[serde(default)]
    pub risk_level: Option<String>,
}

pub(super) fn parse_status(raw: &str) -> Option<ProviderStatus> {
    match raw.trim().to_lowercase().as_str() {
        "new" | "pending" | "processing" => Some(ProviderStatus::Pending),
        "success" => Some(ProviderStatus::Success),
        "failed" | "error" => Some(ProviderStatus::Failure),
        _ => None,
    }
}

/// Map provider risk words onto the shared vocabulary.
///
/// Unknown words pass through unchanged so the caller rejects them.
pub(super) fn risk_word(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "severe" => "critical".to_string(),
        "no risk" | "no_risk" => "none".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(parse_status("new"), Some(ProviderStatus::Pending));
        assert_eq!(parse_status("Pending"), Some(ProviderStatus::Pending));
        assert_eq!(parse_status("success"), Some(ProviderStatus::Success));
        assert_eq!(parse_status("failed"), Some(ProviderStatus::Failure));
        assert_eq!(parse_status("halfway"), None);
    }

    #[test]
    fn test_risk_words() {
        assert_eq!(risk_word("Severe"), "critical");
        assert_eq!(risk_word("no risk"), "none");
        assert_eq!(risk_word("medium"), "medium");
        assert_eq!(risk_word("purple"), "purple");
    }
}
