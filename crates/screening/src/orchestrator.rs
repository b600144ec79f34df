//! Screening Orchestrator - synchronous screening of a single transaction
//!
//! ```text
//! slug ─► provider ─► currency ─► address ─► credentials ─► authorizer
//!                                                               │
//!            store.create_screening ◄── normalize ◄── InitCheckTransaction
//! ```
//!
//! Everything left of the provider call is rejected without touching the
//! network. The store write happens only after the provider answered.

use std::sync::Arc;
use std::time::Duration;

use aml_core::{
    Check, CheckStatus, Direction, NewCheck, NewHistory, ProviderCurrency, ProviderId, RiskLevel,
    UserId,
};
use aml_providers::{CheckRequest, ProviderError, ProviderRegistry, ScreeningClient};
use aml_store::ScreeningStore;

use crate::address::AddressValidator;
use crate::error::{ScreeningError, ScreeningResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Input of [`ScreeningService::score_transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRequest {
    pub tx_id: String,
    pub currency_id: i64,
    pub provider: String,
    pub direction: Direction,
    pub output_address: String,
}

/// Resolve a provider slug to a registered provider
pub(crate) fn resolve_provider(
    registry: &ProviderRegistry,
    slug: &str,
) -> ScreeningResult<(ProviderId, Arc<dyn ScreeningClient>)> {
    let id = ProviderId::from_slug(slug)
        .map_err(|_| ScreeningError::UnsupportedProvider(slug.to_string()))?;
    let client = registry
        .lookup(id)
        .map_err(|_| ScreeningError::UnsupportedProvider(slug.to_string()))?;
    Ok((id, client))
}

/// Screens transactions and answers catalogue queries
pub struct ScreeningService {
    store: Arc<dyn ScreeningStore>,
    registry: Arc<ProviderRegistry>,
    validator: Arc<dyn AddressValidator>,
    request_timeout: Duration,
}

impl ScreeningService {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        registry: Arc<ProviderRegistry>,
        validator: Arc<dyn AddressValidator>,
    ) -> Self {
        Self {
            store,
            registry,
            validator,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Screen one transaction and persist the outcome.
    ///
    /// Creates exactly one Check and one history row; the Check is queued
    /// for polling only when the provider reports it as still pending.
    pub async fn score_transaction(
        &self,
        user_id: UserId,
        mut request: ScoreRequest,
    ) -> ScreeningResult<Check> {
        // Validated, sent and stored in the same trimmed form
        request.tx_id = request.tx_id.trim().to_string();
        request.output_address = request.output_address.trim().to_string();

        if request.tx_id.is_empty() {
            return Err(ScreeningError::InvalidInput("tx_id is empty".into()));
        }

        let (provider, client) = resolve_provider(&self.registry, &request.provider)?;

        let currency = self
            .store
            .provider_currency(provider, request.currency_id)
            .await?
            .ok_or(ScreeningError::CurrencyNotSupported {
                provider,
                currency_id: request.currency_id,
            })?;

        if !self.validator.is_valid(&request.output_address, currency.family) {
            tracing::warn!(
                provider = %provider,
                family = %currency.family,
                address = %request.output_address,
                "Rejected screening with invalid address"
            );
            return Err(ScreeningError::InvalidAddress {
                address: request.output_address,
                family: currency.family,
            });
        }

        let credentials = self.store.credentials(user_id, provider).await?;
        let authorizer =
            self.registry
                .create_authorizer(provider, &credentials, Some(&request.tx_id))?;

        let check_request = CheckRequest {
            tx_id: request.tx_id.clone(),
            currency,
            direction: request.direction,
            output_address: request.output_address.clone(),
        };

        let result = tokio::time::timeout(
            self.request_timeout,
            client.init_check_transaction(&check_request, &authorizer),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.request_timeout.as_millis() as u64))??;

        let status = result.status.check_status();
        let risk_level = match RiskLevel::normalize(result.risk_level.as_deref()) {
            Ok(level) if status.is_terminal() => level,
            Ok(_) => RiskLevel::Undefined,
            Err(e) => {
                tracing::error!(
                    provider = %provider,
                    tx_id = %request.tx_id,
                    error = %e,
                    "Provider returned unrecognized risk level"
                );
                return Err(e.into());
            }
        };

        let check = self
            .store
            .create_screening(
                NewCheck {
                    user_id,
                    provider,
                    tx_id: request.tx_id,
                    currency_id: request.currency_id,
                    direction: request.direction,
                    output_address: request.output_address,
                    external_id: result.external_id,
                    status,
                    score: result.score,
                    risk_level,
                },
                NewHistory::success(result.raw_request, result.raw_response),
            )
            .await?;

        tracing::info!(
            check_id = %check.id,
            provider = %provider,
            status = %check.status,
            queued = check.status == CheckStatus::Pending,
            "Check created"
        );

        Ok(check)
    }

    /// Providers currently registered
    pub fn get_all_active_providers(&self) -> Vec<ProviderId> {
        self.registry.list_registered()
    }

    pub async fn get_supported_currencies(
        &self,
        provider_slug: &str,
    ) -> ScreeningResult<Vec<ProviderCurrency>> {
        let (provider, _) = resolve_provider(&self.registry, provider_slug)?;
        Ok(self.store.supported_currencies(provider).await?)
    }
}
