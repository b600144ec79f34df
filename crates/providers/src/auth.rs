//! Authorizer - provider-specific request authentication
//!
//! The set of signing schemes is closed: each provider contributes one
//! variant. Adding a provider means adding a variant and a registry entry;
//! the orchestrator and poller only ever see [`Authorizer`].

use aml_core::ProviderId;

use crate::amlbot::AmlbotAuthorizer;
use crate::bitok::BitokAuthorizer;
use crate::error::ProviderResult;
use crate::request::OutgoingRequest;

/// Credentials-bound signer for outgoing provider requests.
///
/// Stateless beyond the credentials captured at construction; each call to
/// [`Authorizer::authorize`] signs exactly one request.
#[derive(Debug, Clone)]
pub enum Authorizer {
    /// Digest token appended as form fields / query parameters
    Amlbot(AmlbotAuthorizer),
    /// HMAC-SHA256 signature carried in headers
    Bitok(BitokAuthorizer),
}

impl Authorizer {
    pub fn provider(&self) -> ProviderId {
        match self {
            Authorizer::Amlbot(_) => ProviderId::Amlbot,
            Authorizer::Bitok(_) => ProviderId::Bitok,
        }
    }

    /// Add authentication to `request` in place
    pub fn authorize(&self, request: &mut OutgoingRequest) -> ProviderResult<()> {
        match self {
            Authorizer::Amlbot(inner) => inner.authorize(request),
            Authorizer::Bitok(inner) => inner.authorize(request),
        }
    }
}

impl From<AmlbotAuthorizer> for Authorizer {
    fn from(inner: AmlbotAuthorizer) -> Self {
        Authorizer::Amlbot(inner)
    }
}

impl From<BitokAuthorizer> for Authorizer {
    fn from(inner: BitokAuthorizer) -> Self {
        Authorizer::Bitok(inner)
    }
}
