//! Provider-agnostic screening contract

use async_trait::async_trait;

use aml_core::{CheckStatus, Direction, ProviderCurrency, ProviderId, Score};

use crate::auth::Authorizer;
use crate::error::{ProviderError, ProviderResult, RawExchange};
use crate::request::{HttpResponse, OutgoingRequest};
use crate::transport::HttpTransport;

/// Transaction to screen
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub tx_id: String,
    pub currency: ProviderCurrency,
    pub direction: Direction,
    pub output_address: String,
}

/// Provider-side state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// New or still being processed
    Pending,
    Success,
    Failure,
}

impl ProviderStatus {
    pub fn check_status(&self) -> CheckStatus {
        match self {
            ProviderStatus::Pending => CheckStatus::Pending,
            ProviderStatus::Success => CheckStatus::Success,
            ProviderStatus::Failure => CheckStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProviderStatus::Pending)
    }
}

/// Normalized outcome of one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub external_id: String,
    pub score: Score,
    /// Risk word in the shared vocabulary; validated by the caller
    pub risk_level: Option<String>,
    pub status: ProviderStatus,
    pub raw_request: Vec<u8>,
    pub raw_response: Vec<u8>,
    pub http_status: u16,
}

/// Client for one AML screening provider
#[async_trait]
pub trait ScreeningClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Submit a transaction for screening
    async fn init_check_transaction(
        &self,
        request: &CheckRequest,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult>;

    /// Fetch the current state of a previously submitted check
    async fn fetch_check_status(
        &self,
        external_id: &str,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult>;

    /// Harmless authenticated read, used only to validate credentials
    async fn test_request_with_auth(&self, authorizer: &Authorizer) -> ProviderResult<()>;
}

/// Authorize, send, and reject non-2xx responses.
///
/// Returns the audit bytes of the request as sent together with the response.
pub(crate) async fn dispatch(
    transport: &dyn HttpTransport,
    mut request: OutgoingRequest,
    authorizer: &Authorizer,
) -> ProviderResult<(Vec<u8>, HttpResponse)> {
    authorizer.authorize(&mut request)?;
    let raw_request = request.audit_bytes();

    let response = transport.send(&request).await?;
    if !response.is_success() {
        tracing::warn!(
            provider = %authorizer.provider(),
            status = response.status,
            "Provider returned non-success status"
        );
        return Err(ProviderError::Http {
            status: response.status,
            exchange: RawExchange {
                request: raw_request,
                response: response.body,
            },
        });
    }

    Ok((raw_request, response))
}
