//! Provider-specific currency metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::provider::ProviderId;

/// Blockchain family an address must belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockchainFamily {
    /// Bitcoin and its forks (BTC, LTC, BCH, DOGE)
    Bitcoin,
    /// Ethereum-compatible chains
    Evm,
    Tron,
}

impl BlockchainFamily {
    pub fn code(&self) -> &'static str {
        match self {
            BlockchainFamily::Bitcoin => "bitcoin",
            BlockchainFamily::Evm => "evm",
            BlockchainFamily::Tron => "tron",
        }
    }
}

impl fmt::Display for BlockchainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BlockchainFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(BlockchainFamily::Bitcoin),
            "evm" | "ethereum" | "eth" => Ok(BlockchainFamily::Evm),
            "tron" | "trx" => Ok(BlockchainFamily::Tron),
            _ => Err(CoreError::UnknownFamily(s.to_string())),
        }
    }
}

/// How a platform currency is named by a given provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCurrency {
    pub provider: ProviderId,
    /// Platform currency identifier
    pub currency_id: i64,
    /// Platform ticker, e.g. `USDT`
    pub code: String,
    /// Asset code the provider expects, e.g. `TRX` or `USDT`
    pub asset: String,
    /// Provider network code, e.g. `TRX`, `ETH`, `BTC`
    pub network: String,
    /// Provider token identifier or contract, when the asset is a token
    pub token_id: Option<String>,
    pub family: BlockchainFamily,
}
