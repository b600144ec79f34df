//! Provider credentials owned by a user
//!
//! Values are secrets: `Debug` output and [`CredentialSet::masked`] never
//! reveal more than the last four characters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Name of a secret value a provider may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
    AccessKeyId,
    AccessKey,
    SecretKey,
    AccessId,
}

impl CredentialKey {
    pub fn code(&self) -> &'static str {
        match self {
            CredentialKey::AccessKeyId => "access_key_id",
            CredentialKey::AccessKey => "access_key",
            CredentialKey::SecretKey => "secret_key",
            CredentialKey::AccessId => "access_id",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CredentialKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "access_key_id" => Ok(CredentialKey::AccessKeyId),
            "access_key" => Ok(CredentialKey::AccessKey),
            "secret_key" => Ok(CredentialKey::SecretKey),
            "access_id" => Ok(CredentialKey::AccessId),
            other => Err(CoreError::UnknownCredentialKey(other.to_string())),
        }
    }
}

/// Named secret values for one user and one provider
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    values: BTreeMap<CredentialKey, String>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: CredentialKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: CredentialKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Value for `key`, treating blank values as absent
    pub fn get(&self, key: CredentialKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Keys from `required` that are missing or blank
    pub fn missing(&self, required: &[CredentialKey]) -> Vec<CredentialKey> {
        required
            .iter()
            .copied()
            .filter(|key| self.get(*key).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CredentialKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Key names with masked values, safe to display
    pub fn masked(&self) -> BTreeMap<CredentialKey, String> {
        self.values
            .iter()
            .map(|(k, v)| (*k, mask(v)))
            .collect()
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.masked()).finish()
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
