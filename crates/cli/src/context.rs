//! Application context - wires everything together

use std::path::Path;
use std::sync::Arc;

use aml_providers::{HttpTransport, ProviderRegistry, ReqwestTransport};
use aml_screening::{
    CredentialService, HistoryService, PollerSettings, ScreeningConfig, ScreeningService,
    ShapeValidator, StatusPoller,
};
use aml_store::SqliteStore;

/// Application context - one store, one registry, the services built on them
pub struct AppContext {
    pub config: ScreeningConfig,
    pub store: Arc<SqliteStore>,
    pub registry: Arc<ProviderRegistry>,
    pub screening: ScreeningService,
    pub history: HistoryService,
    pub credentials: CredentialService,
    pub poller: Arc<StatusPoller>,
}

impl AppContext {
    /// Load configuration, open (and migrate) the database, register providers
    pub async fn new(config_path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let config = ScreeningConfig::load(config_path)?;
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        Self::with_transport(config, transport).await
    }

    /// Same as [`AppContext::new`] with an explicit configuration and transport
    pub async fn with_transport(
        config: ScreeningConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, anyhow::Error> {
        let store = SqliteStore::connect(&config.database_url).await?;
        store.migrate().await?;
        let store = Arc::new(store);

        let registry = Arc::new(config.build_registry(transport)?);
        tracing::info!(
            database = %config.database_url,
            providers = ?registry.list_registered(),
            "Context ready"
        );

        let screening = ScreeningService::new(
            store.clone(),
            registry.clone(),
            Arc::new(ShapeValidator),
        )
        .with_request_timeout(config.request_timeout());
        let history = HistoryService::new(store.clone());
        let credentials =
            CredentialService::new(store.clone(), registry.clone(), config.request_timeout());
        let poller = Arc::new(StatusPoller::new(
            store.clone(),
            registry.clone(),
            PollerSettings::from(&config),
        ));

        Ok(Self {
            config,
            store,
            registry,
            screening,
            history,
            credentials,
            poller,
        })
    }
}
