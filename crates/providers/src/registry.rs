//! Provider Registry - provider id → (client, authorizer factory)
//!
//! Built once at startup and then shared behind an `Arc`; every method after
//! construction takes `&self`, so concurrent lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use aml_core::{CredentialSet, ProviderId};

use crate::auth::Authorizer;
use crate::client::ScreeningClient;
use crate::error::{ProviderError, ProviderResult};

/// Builds an [`Authorizer`] from stored credentials and a correlation hint
pub type AuthorizerFactory = fn(&CredentialSet, Option<&str>) -> ProviderResult<Authorizer>;

/// One registered provider
#[derive(Clone)]
pub struct RegisteredProvider {
    pub client: Arc<dyn ScreeningClient>,
    pub authorizer_factory: AuthorizerFactory,
}

/// Registry of enabled providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, RegisteredProvider>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous registration for `id`
    pub fn register(
        &mut self,
        id: ProviderId,
        client: Arc<dyn ScreeningClient>,
        authorizer_factory: AuthorizerFactory,
    ) {
        if self
            .providers
            .insert(
                id,
                RegisteredProvider {
                    client,
                    authorizer_factory,
                },
            )
            .is_some()
        {
            tracing::warn!(provider = %id, "Provider registered twice, replacing");
        } else {
            tracing::debug!(provider = %id, "Provider registered");
        }
    }

    pub fn lookup(&self, id: ProviderId) -> ProviderResult<Arc<dyn ScreeningClient>> {
        self.providers
            .get(&id)
            .map(|p| p.client.clone())
            .ok_or(ProviderError::Unregistered(id))
    }

    /// Build an authorizer for `id` from `credentials`.
    ///
    /// Fails if the provider is not registered or a required key is missing
    /// or blank.
    pub fn create_authorizer(
        &self,
        id: ProviderId,
        credentials: &CredentialSet,
        correlation_id: Option<&str>,
    ) -> ProviderResult<Authorizer> {
        let provider = self
            .providers
            .get(&id)
            .ok_or(ProviderError::Unregistered(id))?;
        (provider.authorizer_factory)(credentials, correlation_id)
    }

    /// Registered provider ids in stable order
    pub fn list_registered(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.providers.keys().copied().collect();
        ids.sort_by_key(|id| id.slug());
        ids
    }

    pub fn is_registered(&self, id: ProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amlbot::{self, AmlbotClient};
    use crate::bitok::{self, BitokClient};
    use crate::client::stub::ScriptedTransport;
    use aml_core::CredentialKey;

    fn registry() -> ProviderRegistry {
        let transport = Arc::new(ScriptedTransport::new());
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderId::Bitok,
            Arc::new(BitokClient::new("https://bitok.test", transport.clone()).unwrap()),
            bitok::build_authorizer,
        );
        registry.register(
            ProviderId::Amlbot,
            Arc::new(AmlbotClient::new("https://amlbot.test", transport).unwrap()),
            amlbot::build_authorizer,
        );
        registry
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list_registered().is_empty());
        assert!(matches!(
            registry.lookup(ProviderId::Amlbot),
            Err(ProviderError::Unregistered(ProviderId::Amlbot))
        ));
    }

    #[test]
    fn test_lookup_and_list() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.list_registered(),
            vec![ProviderId::Amlbot, ProviderId::Bitok]
        );
        assert_eq!(
            registry.lookup(ProviderId::Bitok).unwrap().provider(),
            ProviderId::Bitok
        );
    }

    #[test]
    fn test_create_authorizer_picks_scheme() {
        let registry = registry();
        let creds = CredentialSet::new()
            .with(CredentialKey::AccessKeyId, "kid")
            .with(CredentialKey::SecretKey, "s");

        let auth = registry
            .create_authorizer(ProviderId::Bitok, &creds, Some("tx"))
            .unwrap();
        assert_eq!(auth.provider(), ProviderId::Bitok);
    }

    #[test]
    fn test_create_authorizer_missing_keys() {
        let registry = registry();
        let creds = CredentialSet::new().with(CredentialKey::AccessId, "123");

        let err = registry
            .create_authorizer(ProviderId::Amlbot, &creds, None)
            .unwrap_err();
        match err {
            ProviderError::MissingCredentials { provider, keys } => {
                assert_eq!(provider, ProviderId::Amlbot);
                assert_eq!(keys, vec![CredentialKey::AccessKey]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_authorizer_unregistered() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderId::Amlbot,
            Arc::new(AmlbotClient::new("https://amlbot.test", Arc::new(ScriptedTransport::new())).unwrap()),
            amlbot::build_authorizer,
        );

        let err = registry
            .create_authorizer(ProviderId::Bitok, &CredentialSet::new(), None)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unregistered(ProviderId::Bitok)));
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.lookup(ProviderId::Amlbot).is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
