//! Risk vocabulary and normalized score
//!
//! Every provider reports risk on its own scale and with its own words.
//! Before anything is persisted the value is mapped onto:
//! - [`Score`]: a decimal on the closed interval `[0, 100]`
//! - [`RiskLevel`]: a closed vocabulary; unknown words are an error, never a default

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Qualitative AML risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
    /// No classification yet (check still pending, or provider gave none)
    #[default]
    Undefined,
}

impl RiskLevel {
    /// Canonical lower-case code
    pub fn code(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Undefined => "undefined",
        }
    }

    /// Normalize an optional provider value.
    ///
    /// Absence maps to [`RiskLevel::Undefined`]; a present but unrecognized
    /// word is rejected.
    pub fn normalize(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw {
            None => Ok(RiskLevel::Undefined),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RiskLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RiskLevel::None),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            "undefined" => Ok(RiskLevel::Undefined),
            _ => Err(CoreError::UnknownRiskLevel(s.to_string())),
        }
    }
}

/// Risk score normalized to the `[0, 100]` scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Score(Decimal);

impl Score {
    pub const ZERO: Score = Score(Decimal::ZERO);
    pub const MAX: Score = Score(Decimal::ONE_HUNDRED);

    /// Create a score that is already on the 0-100 scale
    pub fn new(value: Decimal) -> Result<Self, CoreError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(CoreError::InvalidScore {
                value: value.to_string(),
                reason: "must be within [0, 100]".to_string(),
            });
        }
        Ok(Score(value))
    }

    /// Rescale a provider-native value whose scale tops out at `native_max`.
    ///
    /// Out-of-range inputs are clamped; the result is rounded to 2 decimals.
    /// Values too large to rescale are rejected.
    pub fn normalize(raw: Decimal, native_max: Decimal) -> Result<Self, CoreError> {
        if native_max <= Decimal::ZERO {
            return Err(CoreError::InvalidScore {
                value: raw.to_string(),
                reason: format!("native scale maximum {native_max} is not positive"),
            });
        }

        let scaled = raw
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|v| v.checked_div(native_max))
            .ok_or_else(|| CoreError::InvalidScore {
                value: raw.to_string(),
                reason: format!("does not fit the 0-100 scale from native maximum {native_max}"),
            })?;
        let clamped = scaled.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        Ok(Score(
            clamped.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::ZERO
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Score {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for Decimal {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl FromStr for Score {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Decimal = s.trim().parse().map_err(|e: rust_decimal::Error| {
            CoreError::InvalidScore {
                value: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Score::new(value)
    }
}
