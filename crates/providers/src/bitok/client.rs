//! Bitok client

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::Value;
use url::Url;

use aml_core::{ProviderId, Score};

use super::wire::{self, CheckTransferRequest, ErrorBody, ManualCheck};
use crate::auth::Authorizer;
use crate::client::{dispatch, CheckRequest, CheckResult, ScreeningClient};
use crate::error::{ProviderError, ProviderResult, RawExchange};
use crate::request::{HttpResponse, OutgoingRequest, RequestKind};
use crate::transport::HttpTransport;

const CHECK_TRANSFER_PATH: &str = "v1/manual-checks/check-transfer/";
const NETWORKS_PATH: &str = "v1/basics/networks/";

pub struct BitokClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
}

impl BitokClient {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid base url {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            transport,
        })
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid endpoint {path}: {e}")))
    }

    /// Send and decode the body, surfacing a 2xx error envelope as an error
    async fn call(
        &self,
        request: OutgoingRequest,
        authorizer: &Authorizer,
    ) -> ProviderResult<(Vec<u8>, HttpResponse, Value)> {
        let (raw_request, response) = dispatch(self.transport.as_ref(), request, authorizer).await?;

        let value: Value = match serde_json::from_slice(&response.body) {
            Ok(value) => value,
            Err(e) => {
                return Err(ProviderError::Decode {
                    message: e.to_string(),
                    exchange: RawExchange {
                        request: raw_request,
                        response: response.body,
                    },
                })
            }
        };

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = serde_json::from_value::<ErrorBody>(error.clone())
                .map(|body| body.describe())
                .unwrap_or_else(|_| error.to_string());
            return Err(ProviderError::Rejected {
                message,
                exchange: RawExchange {
                    request: raw_request,
                    response: response.body,
                },
            });
        }

        Ok((raw_request, response, value))
    }

    fn into_result(
        raw_request: Vec<u8>,
        response: HttpResponse,
        value: Value,
    ) -> ProviderResult<CheckResult> {
        let check: ManualCheck = match serde_json::from_value(value) {
            Ok(check) => check,
            Err(e) => {
                return Err(ProviderError::Decode {
                    message: e.to_string(),
                    exchange: RawExchange {
                        request: raw_request,
                        response: response.body,
                    },
                })
            }
        };

        let Some(status) = wire::parse_status(&check.check_status) else {
            return Err(ProviderError::UnknownStatus {
                status: check.check_status,
                exchange: RawExchange {
                    request: raw_request,
                    response: response.body,
                },
            });
        };

        let score = match check.risk_score {
            Some(raw) => match Score::normalize(raw, Decimal::ONE_HUNDRED) {
                Ok(score) => score,
                Err(e) => {
                    return Err(ProviderError::Decode {
                        message: e.to_string(),
                        exchange: RawExchange {
                            request: raw_request,
                            response: response.body,
                        },
                    })
                }
            },
            None => Score::ZERO,
        };

        Ok(CheckResult {
            external_id: check.id.to_string(),
            score,
            risk_level: check.risk_level.as_deref().map(wire::risk_word),
            status,
            http_status: response.status,
            raw_request,
            raw_response: response.body,
        })
    }
}

impl fmt::Debug for BitokClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitokClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[async_trait]
impl ScreeningClient for BitokClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Bitok
    }

    async fn init_check_transaction(
        &self,
        request: &CheckRequest,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        let body = CheckTransferRequest {
            direction: wire::direction(request.direction),
            network: &request.currency.network,
            tx_hash: &request.tx_id,
            token_id: request.currency.token_id.as_deref(),
            output_address: &request.output_address,
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        let outgoing = OutgoingRequest::new(
            RequestKind::Check,
            Method::POST,
            self.endpoint(CHECK_TRANSFER_PATH)?,
        )
        .with_json(body);

        let (raw_request, response, value) = self.call(outgoing, authorizer).await?;
        Self::into_result(raw_request, response, value)
    }

    async fn fetch_check_status(
        &self,
        external_id: &str,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        if external_id.is_empty() || !external_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProviderError::InvalidRequest(format!(
                "invalid check id: {external_id:?}"
            )));
        }

        let outgoing = OutgoingRequest::new(
            RequestKind::Status,
            Method::GET,
            self.endpoint(&format!("v1/manual-checks/{external_id}/"))?,
        );

        let (raw_request, response, value) = self.call(outgoing, authorizer).await?;
        Self::into_result(raw_request, response, value)
    }

    async fn test_request_with_auth(&self, authorizer: &Authorizer) -> ProviderResult<()> {
        let outgoing =
            OutgoingRequest::new(RequestKind::Verify, Method::GET, self.endpoint(NETWORKS_PATH)?);

        self.call(outgoing, authorizer).await.map(|_| ())
    }
}
