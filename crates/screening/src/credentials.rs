//! Credential management
//!
//! New credentials are live-tested against the provider before they are
//! stored; a failed verification leaves the stored set untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use aml_core::{CredentialKey, CredentialSet, UserId};
use aml_providers::{ProviderError, ProviderRegistry};
use aml_store::ScreeningStore;

use crate::error::ScreeningResult;
use crate::orchestrator::resolve_provider;

pub struct CredentialService {
    store: Arc<dyn ScreeningStore>,
    registry: Arc<ProviderRegistry>,
    verify_timeout: Duration,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        registry: Arc<ProviderRegistry>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            verify_timeout,
        }
    }

    /// Stored key names with masked values
    pub async fn get(
        &self,
        user_id: UserId,
        provider_slug: &str,
    ) -> ScreeningResult<BTreeMap<CredentialKey, String>> {
        let (provider, _) = resolve_provider(&self.registry, provider_slug)?;
        Ok(self.store.credentials(user_id, provider).await?.masked())
    }

    /// Verify `credentials` against the provider and store them on success
    pub async fn update(
        &self,
        user_id: UserId,
        provider_slug: &str,
        credentials: CredentialSet,
    ) -> ScreeningResult<()> {
        let (provider, client) = resolve_provider(&self.registry, provider_slug)?;
        let authorizer = self
            .registry
            .create_authorizer(provider, &credentials, None)?;

        let verified = tokio::time::timeout(self.verify_timeout, client.test_request_with_auth(&authorizer))
            .await
            .map_err(|_| ProviderError::Timeout(self.verify_timeout.as_millis() as u64))
            .and_then(|result| result);

        if let Err(e) = verified {
            tracing::warn!(
                user_id,
                provider = %provider,
                error = %e,
                "Credential verification failed, not saved"
            );
            return Err(e.into());
        }

        self.store
            .save_credentials(user_id, provider, &credentials)
            .await?;
        tracing::info!(user_id, provider = %provider, "Credentials updated");
        Ok(())
    }

    /// Returns whether anything was stored
    pub async fn delete(&self, user_id: UserId, provider_slug: &str) -> ScreeningResult<bool> {
        let (provider, _) = resolve_provider(&self.registry, provider_slug)?;
        let removed = self.store.delete_credentials(user_id, provider).await?;
        tracing::info!(user_id, provider = %provider, removed, "Credentials deleted");
        Ok(removed)
    }
}
