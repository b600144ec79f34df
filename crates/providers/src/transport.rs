//! HTTP transport seam

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderResult};
use crate::request::{HttpResponse, OutgoingRequest};

/// Sends an authorized request and returns the response bytes verbatim.
///
/// Non-2xx statuses are returned as responses, not errors; clients decide.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &OutgoingRequest) -> ProviderResult<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aml-screening/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { http, timeout })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutgoingRequest) -> ProviderResult<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        tracing::debug!(
            url = %request.url,
            status,
            bytes = body.len(),
            "Provider responded"
        );

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl ReqwestTransport {
    fn map_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProviderError::Transport(error.to_string())
        }
    }
}
