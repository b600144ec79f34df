//! Shared fixtures: a scripted provider client and a seeded in-memory store

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use aml_core::{BlockchainFamily, CredentialKey, CredentialSet, Direction, ProviderCurrency, ProviderId, Score};
use aml_providers::{
    amlbot, Authorizer, CheckRequest, CheckResult, ProviderError, ProviderRegistry, ProviderResult,
    ProviderStatus, RawExchange, ScreeningClient,
};
use aml_screening::{PollerSettings, ScoreRequest, ScreeningService, ShapeValidator, StatusPoller};
use aml_store::{ScreeningStore, SqliteStore};

pub const USER: i64 = 1;
pub const BTC: i64 = 1;
pub const BTC_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

/// Provider client replaying canned results
#[derive(Default)]
pub struct ScriptedClient {
    init: Mutex<VecDeque<ProviderResult<CheckResult>>>,
    status: Mutex<VecDeque<ProviderResult<CheckResult>>>,
    verify: Mutex<VecDeque<ProviderResult<()>>>,
    /// When set, status calls wait for a permit before answering
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    pub init_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    /// Status calls currently running and the highest value seen
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Last request handed to `init_check_transaction`
    pub last_init: Mutex<Option<CheckRequest>>,
}

/// Counts a status call as running until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init(self, result: ProviderResult<CheckResult>) -> Self {
        self.init.lock().unwrap().push_back(result);
        self
    }

    pub fn on_status(self, result: ProviderResult<CheckResult>) -> Self {
        self.status.lock().unwrap().push_back(result);
        self
    }

    pub fn on_verify(self, result: ProviderResult<()>) -> Self {
        self.verify.lock().unwrap().push_back(result);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ScreeningClient for ScriptedClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Amlbot
    }

    async fn init_check_transaction(
        &self,
        request: &CheckRequest,
        _authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_init.lock().unwrap() = Some(request.clone());
        self.init
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted init".into())))
    }

    async fn fetch_check_status(
        &self,
        _external_id: &str,
        _authorizer: &Authorizer,
    ) -> ProviderResult<CheckResult> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _running = InFlight(&self.in_flight);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.status
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted status".into())))
    }

    async fn test_request_with_auth(&self, _authorizer: &Authorizer) -> ProviderResult<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub fn result(status: ProviderStatus, score: Decimal, risk: Option<&str>) -> ProviderResult<CheckResult> {
    Ok(CheckResult {
        external_id: "uid-1".to_string(),
        score: Score::new(score).unwrap(),
        risk_level: risk.map(str::to_string),
        status,
        raw_request: b"hash=tx123&token=abc".to_vec(),
        raw_response: format!("{{\"status\":\"{status:?}\"}}").into_bytes(),
        http_status: 200,
    })
}

pub fn pending(score: Decimal) -> ProviderResult<CheckResult> {
    result(ProviderStatus::Pending, score, None)
}

pub fn http_error(status: u16) -> ProviderResult<CheckResult> {
    Err(ProviderError::Http {
        status,
        exchange: RawExchange {
            request: b"uid=uid-1".to_vec(),
            response: b"unavailable".to_vec(),
        },
    })
}

pub fn amlbot_credentials() -> CredentialSet {
    CredentialSet::new()
        .with(CredentialKey::AccessId, "123")
        .with(CredentialKey::AccessKey, "test-key")
}

pub fn registry_with(client: Arc<ScriptedClient>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(ProviderId::Amlbot, client, amlbot::build_authorizer);
    Arc::new(registry)
}

/// In-memory store with one BTC currency and credentials for [`USER`]
pub async fn seeded_store() -> Arc<SqliteStore> {
    seed(SqliteStore::in_memory().await.unwrap()).await
}

async fn seed(store: SqliteStore) -> Arc<SqliteStore> {
    store
        .upsert_currency(&ProviderCurrency {
            provider: ProviderId::Amlbot,
            currency_id: BTC,
            code: "BTC".to_string(),
            asset: "BTC".to_string(),
            network: "BTC".to_string(),
            token_id: None,
            family: BlockchainFamily::Bitcoin,
        })
        .await
        .unwrap();
    store
        .save_credentials(USER, ProviderId::Amlbot, &amlbot_credentials())
        .await
        .unwrap();
    Arc::new(store)
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub client: Arc<ScriptedClient>,
    pub registry: Arc<ProviderRegistry>,
    pub service: ScreeningService,
    pub poller: Arc<StatusPoller>,
}

pub async fn harness(client: ScriptedClient, settings: PollerSettings) -> Harness {
    harness_on(seeded_store().await, client, settings)
}

/// Harness over a database file, seeded like [`seeded_store`]
pub async fn file_harness(
    dir: &tempfile::TempDir,
    client: ScriptedClient,
    settings: PollerSettings,
) -> Harness {
    let url = format!("sqlite:{}", dir.path().join("aml.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();
    store.migrate().await.unwrap();
    harness_on(seed(store).await, client, settings)
}

fn harness_on(store: Arc<SqliteStore>, client: ScriptedClient, settings: PollerSettings) -> Harness {
    let client = Arc::new(client);
    let registry = registry_with(client.clone());
    let service = ScreeningService::new(store.clone(), registry.clone(), Arc::new(ShapeValidator));
    let poller = Arc::new(StatusPoller::new(store.clone(), registry.clone(), settings));
    Harness {
        store,
        client,
        registry,
        service,
        poller,
    }
}

pub fn settings(max_attempts: u32) -> PollerSettings {
    PollerSettings {
        max_attempts,
        concurrency: 4,
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn btc_request() -> ScoreRequest {
    ScoreRequest {
        tx_id: "tx123".to_string(),
        currency_id: BTC,
        provider: "amlbot".to_string(),
        direction: Direction::Deposit,
        output_address: BTC_ADDRESS.to_string(),
    }
}
