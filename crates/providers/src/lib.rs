//! AML Providers - contract and integrations for external screening services
//!
//! ```text
//!  ScreeningClient ──builds──► OutgoingRequest
//!        │                          │
//!        │                  Authorizer::authorize (mutates in place)
//!        │                          │
//!        └──────────────► HttpTransport::send ──► HttpResponse ──► CheckResult
//! ```
//!
//! ## Key Components
//!
//! - [`client::ScreeningClient`] - provider-agnostic check / status / credential verification contract
//! - [`auth::Authorizer`] - closed set of signing schemes, one variant per provider
//! - [`registry::ProviderRegistry`] - provider id → (client, authorizer factory)
//! - [`amlbot`] - token scheme, form-encoded API
//! - [`bitok`] - HMAC signature scheme, JSON API

pub mod amlbot;
pub mod auth;
pub mod bitok;
pub mod client;
pub mod error;
pub mod registry;
pub mod request;
pub mod transport;

pub use amlbot::{AmlbotAuthorizer, AmlbotClient};
pub use auth::Authorizer;
pub use bitok::{BitokAuthorizer, BitokClient};
pub use client::{CheckRequest, CheckResult, ProviderStatus, ScreeningClient};
pub use error::{ProviderError, ProviderResult, RawExchange};
pub use registry::{AuthorizerFactory, ProviderRegistry, RegisteredProvider};
pub use request::{HttpResponse, OutgoingRequest, RequestKind};
pub use transport::{HttpTransport, ReqwestTransport};
