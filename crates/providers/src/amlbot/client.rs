//! AMLBot client

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use url::Url;

use aml_core::{ProviderId, Score};

use super::wire::{self, Envelope};
use crate::auth::Authorizer;
use crate::client::{dispatch, CheckRequest, CheckResult, ScreeningClient};
use crate::error::{ProviderError, ProviderResult, RawExchange};
use crate::request::{HttpResponse, OutgoingRequest, RequestKind};
use crate::transport::HttpTransport;

const LOCALE: &str = "en";
const FLOW: &str = "advanced";
const RECHECK_PATH: &str = "recheck";
const STATS_PATH: &str = "stats";

pub struct AmlbotClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
}

impl AmlbotClient {
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

    async fn call(
        &self,
        request: OutgoingRequest,
        authorizer: &Authorizer,
    ) -> ProviderResult<(Vec<u8>, HttpResponse, Envelope)> {
        let (raw_request, response) = dispatch(self.transport.as_ref(), request, authorizer).await?;

        let envelope: Envelope = match serde_json::from_slice(&response.body) {
            Ok(envelope) => envelope,
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

        if !envelope.result {
            let message = envelope
                .description
                .clone()
                .unwrap_or_else(|| "result=false".to_string());
            return Err(ProviderError::Rejected {
                message,
                exchange: RawExchange {
                    request: raw_request,
                    response: response.body,
                },
            });
        }

        Ok((raw_request, response, envelope))
    }

    fn into_result(
        raw_request: Vec<u8>,
        response: HttpResponse,
        envelope: Envelope,
    ) -> ProviderResult<CheckResult> {
        let exchange = |response: HttpResponse, raw_request: Vec<u8>| RawExchange {
            request: raw_request,
            response: response.body,
        };

        let Some(data) = envelope.data else {
            return Err(ProviderError::Decode {
                message: "missing data object".to_string(),
                exchange: exchange(response, raw_request),
            });
        };

        let Some(status) = wire::parse_status(&data.status) else {
            return Err(ProviderError::UnknownStatus {
                status: data.status,
                exchange: exchange(response, raw_request),
            });
        };

        let score = match data.riskscore {
            Some(raw) => Score::normalize(raw, Decimal::ONE).map_err(|e| ProviderError::Decode {
                message: e.to_string(),
                exchange: exchange(response.clone(), raw_request.clone()),
            })?,
            None => Score::ZERO,
        };

        Ok(CheckResult {
            external_id: data.uid,
            score,
            risk_level: data.risk_level.as_deref().map(wire::risk_word),
            status,
            http_status: response.status,
            raw_request,
            raw_response: response.body,
        })
    }
}

impl fmt::Debug for AmlbotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmlbotClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[async_trait]
impl ScreeningClient for AmlbotClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Amlbot
    }

    async fn init_check_transaction(
        &self,
        request: &CheckRequest,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        let outgoing = OutgoingRequest::new(RequestKind::Check, Method::POST, self.base_url.clone())
            .with_form(&[
                ("hash", request.tx_id.as_str()),
                ("address", request.output_address.as_str()),
                ("asset", request.currency.asset.as_str()),
                ("direction", request.direction.code()),
                ("locale", LOCALE),
                ("flow", FLOW),
            ]);

        let (raw_request, response, envelope) = self.call(outgoing, authorizer).await?;
        Self::into_result(raw_request, response, envelope)
    }

    async fn fetch_check_status(
        &self,
        external_id: &str,
        authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        let outgoing = OutgoingRequest::new(
            RequestKind::Status,
            Method::POST,
            self.endpoint(RECHECK_PATH)?,
        )
        .with_form(&[("uid", external_id)]);

        let (raw_request, response, envelope) = self.call(outgoing, authorizer).await?;
        Self::into_result(raw_request, response, envelope)
    }

    async fn test_request_with_auth(&self, authorizer: &Authorizer) -> ProviderResult<()> {
        let outgoing =
            OutgoingRequest::new(RequestKind::Verify, Method::POST, self.endpoint(STATS_PATH)?)
                .with_form::<&str, &str>(&[]);

        self.call(outgoing, authorizer).await.map(|_| ())
    }
}
