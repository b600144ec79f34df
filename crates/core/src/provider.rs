//! Provider identity

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Identifier of an external AML screening provider
///
/// The slug form (`amlbot`, `bitok`) is what the delivery layer sends and
/// what the store persists.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProviderId {
    /// Token-signed, form-encoded provider
    Amlbot,
    /// HMAC-signed, JSON provider
    Bitok,
}

impl ProviderId {
    /// Resolve a delivery-layer slug
    pub fn from_slug(slug: &str) -> Result<Self, CoreError> {
        ProviderId::from_str(slug.trim()).map_err(|_| CoreError::UnknownProvider(slug.to_string()))
    }

    /// Slug used on the wire and in storage
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderId::Amlbot => "amlbot",
            ProviderId::Bitok => "bitok",
        }
    }

    /// Every provider this build knows how to talk to
    pub fn all() -> Vec<ProviderId> {
        ProviderId::iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_roundtrip() {
        for id in ProviderId::all() {
            assert_eq!(ProviderId::from_slug(id.slug()).unwrap(), id);
            assert_eq!(id.to_string(), id.slug());
        }
    }

    #[test]
    fn test_slug_is_case_insensitive() {
        assert_eq!(ProviderId::from_slug("AMLBot").unwrap(), ProviderId::Amlbot);
        assert_eq!(ProviderId::from_slug(" bitok ").unwrap(), ProviderId::Bitok);
    }

    #[test]
    fn test_unknown_slug() {
        let err = ProviderId::from_slug("chainalysis").unwrap_err();
        assert_eq!(err, CoreError::UnknownProvider("chainalysis".to_string()));
    }
}
