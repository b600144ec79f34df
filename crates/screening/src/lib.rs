//! AML Screening - orchestration on top of providers and storage
//!
//! ## Key Components
//!
//! - [`ScreeningService`]: screens a transaction synchronously and persists the result
//! - [`StatusPoller`]: background resolution of pending checks with an attempt ceiling
//! - [`HistoryService`]: paginated read access to checks and their audit trail
//! - [`CredentialService`]: verify-before-save credential management
//! - [`ScreeningConfig`]: tunables and provider switches

pub mod address;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod poller;

pub use address::{AddressValidator, ShapeValidator};
pub use config::{ProviderSettings, ProvidersConfig, ScreeningConfig};
pub use credentials::CredentialService;
pub use error::{ScreeningError, ScreeningResult};
pub use history::{CheckWithHistory, HistoryFilter, HistoryService};
pub use orchestrator::{ScoreRequest, ScreeningService};
pub use poller::{BatchGuard, BatchReport, PollerSettings, StatusPoller, TriggerOutcome};
