//! Screening configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! none at all) is valid. `AML_DATABASE_URL` overrides the database location.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aml_core::ProviderId;
use aml_providers::{amlbot, bitok, AmlbotClient, BitokClient, HttpTransport, ProviderRegistry};

use crate::error::{ScreeningError, ScreeningResult};

/// Environment variable overriding [`ScreeningConfig::database_url`]
pub const DATABASE_URL_ENV: &str = "AML_DATABASE_URL";

/// Configuration for the screening subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // === Poller ===
    /// Seconds between poller runs
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Provider interactions per Check before it is failed (initial check included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Queue entries fetched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Simultaneous provider calls within a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for a single provider call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    // === Providers ===
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Per-provider switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_amlbot")]
    pub amlbot: ProviderSettings,

    #[serde(default = "default_bitok")]
    pub bitok: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
}

fn default_database_url() -> String {
    "sqlite:aml.db?mode=rwc".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    10
}

fn default_batch_size() -> u32 {
    500
}

fn default_concurrency() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_enabled() -> bool {
    true
}

fn default_amlbot() -> ProviderSettings {
    ProviderSettings {
        enabled: true,
        base_url: amlbot::DEFAULT_BASE_URL.to_string(),
    }
}

fn default_bitok() -> ProviderSettings {
    ProviderSettings {
        enabled: true,
        base_url: bitok::DEFAULT_BASE_URL.to_string(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            amlbot: default_amlbot(),
            bitok: default_bitok(),
        }
    }
}

impl ProvidersConfig {
    pub fn settings(&self, provider: ProviderId) -> &ProviderSettings {
        match provider {
            ProviderId::Amlbot => &self.amlbot,
            ProviderId::Bitok => &self.bitok,
        }
    }
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            request_timeout_ms: default_request_timeout_ms(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl ScreeningConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> ScreeningResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// File if given, defaults otherwise; then environment overrides and validation
    pub fn load(path: Option<&Path>) -> ScreeningResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.database_url = url;
            }
        }
    }

    pub fn validate(&self) -> ScreeningResult<()> {
        // The initial check is attempt 1, so a ceiling of 1 leaves no polls
        if self.max_attempts < 2 {
            return Err(ScreeningError::Config("max_attempts must be at least 2".into()));
        }
        if self.batch_size < 1 {
            return Err(ScreeningError::Config("batch_size must be at least 1".into()));
        }
        if self.concurrency < 1 {
            return Err(ScreeningError::Config("concurrency must be at least 1".into()));
        }
        if self.poll_interval_secs < 1 {
            return Err(ScreeningError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.request_timeout_ms < 1 {
            return Err(ScreeningError::Config(
                "request_timeout_ms must be at least 1".into(),
            ));
        }
        for provider in ProviderId::all() {
            let settings = self.providers.settings(provider);
            if settings.enabled && settings.base_url.trim().is_empty() {
                return Err(ScreeningError::Config(format!(
                    "{provider} is enabled but has no base_url"
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Register every enabled provider on top of `transport`
    pub fn build_registry(
        &self,
        transport: Arc<dyn HttpTransport>,
    ) -> ScreeningResult<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();

        for provider in ProviderId::all() {
            let settings = self.providers.settings(provider);
            if !settings.enabled {
                tracing::info!(provider = %provider, "Provider disabled");
                continue;
            }

            match provider {
                ProviderId::Amlbot => registry.register(
                    provider,
                    Arc::new(AmlbotClient::new(&settings.base_url, transport.clone())?),
                    amlbot::build_authorizer,
                ),
                ProviderId::Bitok => registry.register(
                    provider,
                    Arc::new(BitokClient::new(&settings.base_url, transport.clone())?),
                    bitok::build_authorizer,
                ),
            }
        }

        Ok(registry)
    }
}
