//! AML Core - Domain types
//!
//! This crate contains the types shared by every part of the screening
//! subsystem:
//! - [`Check`] / [`CheckHistory`] / [`QueueEntry`]: the persisted screening state
//! - [`RiskLevel`] / [`Score`]: normalized risk vocabulary and 0-100 scale
//! - [`CredentialSet`]: per-user, per-provider named secrets
//! - [`ProviderId`] / [`ProviderCurrency`]: provider identity and asset metadata

pub mod check;
pub mod credentials;
pub mod currency;
pub mod error;
pub mod page;
pub mod provider;
pub mod risk;

pub use check::{
    Check, CheckHistory, CheckId, CheckStatus, Direction, NewCheck, NewHistory, PendingEntry,
    QueueEntry, UserId,
};
pub use credentials::{CredentialKey, CredentialSet};
pub use currency::{BlockchainFamily, ProviderCurrency};
pub use error::CoreError;
pub use page::{Page, Pagination};
pub use provider::ProviderId;
pub use risk::{RiskLevel, Score};
