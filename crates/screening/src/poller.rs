//! Status Poller - resolves pending checks in bounded-concurrency batches
//!
//! ```text
//! tick ─► try_start_batch ─► pending_entries ─► [semaphore] ─► FetchCheckStatus
//!                                                                 │
//!                           finish_batch ◄── record_poll (one tx per entry)
//! ```
//!
//! Provider calls happen outside any storage transaction; each entry is then
//! persisted atomically (history row plus queue/check update).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use aml_core::{CheckStatus, NewHistory, PendingEntry, RiskLevel, Score};
use aml_providers::{CheckResult, ProviderError, ProviderRegistry};
use aml_store::{PollDecision, ScreeningStore};

use crate::config::ScreeningConfig;
use crate::error::{ScreeningError, ScreeningResult};

/// Mutual-exclusion token for batches; a start attempt while held fails
#[derive(Debug, Default)]
pub struct BatchGuard {
    active: AtomicBool,
}

impl BatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a batch is already running
    pub fn try_start_batch(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish_batch(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the guard when the batch ends, including on early return
struct ActiveBatch<'a>(&'a BatchGuard);

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        self.0.finish_batch();
    }
}

/// Poller tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub batch_size: u32,
    pub concurrency: usize,
    pub request_timeout: Duration,
}

impl From<&ScreeningConfig> for PollerSettings {
    fn from(config: &ScreeningConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_attempts,
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&ScreeningConfig::default())
    }
}

/// Counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retried: usize,
    /// Entries whose outcome could not be persisted; retried next run
    pub unrecorded: usize,
}

/// Outcome of [`StatusPoller::trigger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Ran(BatchReport),
    /// Another batch was active; nothing was done
    Skipped,
}

/// Applied when a check runs out of attempts while still unresolved
const GIVE_UP: PollDecision = PollDecision::Finalize {
    status: CheckStatus::Failed,
    score: Score::ZERO,
    risk_level: RiskLevel::Undefined,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Finalized(CheckStatus),
    Retried,
    Unrecorded,
}

pub struct StatusPoller {
    store: Arc<dyn ScreeningStore>,
    registry: Arc<ProviderRegistry>,
    settings: PollerSettings,
    guard: BatchGuard,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        registry: Arc<ProviderRegistry>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
            guard: BatchGuard::new(),
        }
    }

    pub fn guard(&self) -> &BatchGuard {
        &self.guard
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Run batches immediately and then every interval until `shutdown`
    /// resolves. In-flight batches are awaited, not aborted.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut batches = JoinSet::new();
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            concurrency = self.settings.concurrency,
            max_attempts = self.settings.max_attempts,
            "Status poller started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let poller = self.clone();
                    batches.spawn(async move { poller.trigger().await });
                }
                Some(joined) = batches.join_next(), if !batches.is_empty() => {
                    log_batch(joined);
                }
            }
        }

        tracing::info!(in_flight = batches.len(), "Status poller stopping");
        while let Some(joined) = batches.join_next().await {
            log_batch(joined);
        }
    }

    /// Run one batch unless another one is active
    pub async fn trigger(self: &Arc<Self>) -> ScreeningResult<TriggerOutcome> {
        if !self.guard.try_start_batch() {
            tracing::debug!("Batch already active, trigger dropped");
            return Ok(TriggerOutcome::Skipped);
        }
        let _active = ActiveBatch(&self.guard);

        self.run_batch().await.map(TriggerOutcome::Ran)
    }

    async fn run_batch(self: &Arc<Self>) -> ScreeningResult<BatchReport> {
        let entries = self
            .store
            .pending_entries(self.settings.batch_size)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to fetch pending checks"))?;

        let mut report = BatchReport {
            fetched: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            tracing::debug!("No pending checks");
            return Ok(report);
        }
        tracing::info!(entries = entries.len(), "Polling batch started");

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut workers = JoinSet::new();

        for entry in entries {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ScreeningError::Config(format!("poller semaphore closed: {e}")))?;
            let poller = self.clone();
            workers.spawn(async move {
                let _permit = permit;
                poller.process_entry(entry).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(EntryOutcome::Finalized(CheckStatus::Success)) => report.succeeded += 1,
                Ok(EntryOutcome::Finalized(_)) => report.failed += 1,
                Ok(EntryOutcome::Retried) => report.retried += 1,
                Ok(EntryOutcome::Unrecorded) => report.unrecorded += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Polling worker panicked");
                    report.unrecorded += 1;
                }
            }
        }

        tracing::info!(
            fetched = report.fetched,
            succeeded = report.succeeded,
            failed = report.failed,
            retried = report.retried,
            unrecorded = report.unrecorded,
            "Polling batch finished"
        );
        Ok(report)
    }

    async fn fetch_status(&self, pending: &PendingEntry) -> ScreeningResult<CheckResult> {
        let check = &pending.check;
        let client = self.registry.lookup(check.provider)?;
        let credentials = self.store.credentials(check.user_id, check.provider).await?;
        let authorizer = self.registry.create_authorizer(
            check.provider,
            &credentials,
            Some(&check.external_id),
        )?;

        let timeout = self.settings.request_timeout;
        let result = tokio::time::timeout(
            timeout,
            client.fetch_check_status(&check.external_id, &authorizer),
        )
        .await
        .map_err(|_| ProviderError::Timeout(timeout.as_millis() as u64))??;

        Ok(result)
    }

    async fn process_entry(&self, pending: PendingEntry) -> EntryOutcome {
        let check_id = pending.check.id;
        let provider = pending.check.provider;
        let attempt = pending.entry.next_attempt();
        let max_attempts = self.settings.max_attempts;

        let (history, decision, gave_up) = if pending.entry.attempts >= max_attempts {
            // Queued under a higher ceiling; nothing left to spend on a poll
            let reason = format!("attempt ceiling {max_attempts} reached, status not requested");
            (NewHistory::failure(Vec::new(), Vec::new(), reason), GIVE_UP, true)
        } else {
            self.poll_provider(&pending, attempt).await
        };

        match self.store.record_poll(pending.entry, history, decision).await {
            Ok(recorded) => match decision {
                PollDecision::Finalize { status, .. } => {
                    if gave_up {
                        tracing::warn!(
                            check_id = %check_id,
                            provider = %provider,
                            attempt = recorded,
                            "Attempts exhausted, check failed"
                        );
                    } else {
                        tracing::info!(
                            check_id = %check_id,
                            provider = %provider,
                            attempt = recorded,
                            status = %status,
                            "Check finalized"
                        );
                    }
                    EntryOutcome::Finalized(status)
                }
                PollDecision::Retry { .. } => {
                    tracing::debug!(check_id = %check_id, attempt = recorded, "Check still pending");
                    EntryOutcome::Retried
                }
            },
            Err(e) => {
                tracing::error!(
                    check_id = %check_id,
                    provider = %provider,
                    attempt,
                    error = %e,
                    "Failed to record poll"
                );
                EntryOutcome::Unrecorded
            }
        }
    }

    /// Ask the provider for the current status and decide what to persist.
    ///
    /// The flag is set when the check is failed for running out of attempts
    /// rather than on a provider verdict.
    async fn poll_provider(
        &self,
        pending: &PendingEntry,
        attempt: u32,
    ) -> (NewHistory, PollDecision, bool) {
        let check_id = pending.check.id;
        let provider = pending.check.provider;
        let exhausted = attempt >= self.settings.max_attempts;
        let retry = |score: Option<Score>| {
            if exhausted {
                (GIVE_UP, true)
            } else {
                (PollDecision::Retry { score }, false)
            }
        };

        match self.fetch_status(pending).await {
            Ok(result) if result.status.is_terminal() => {
                match RiskLevel::normalize(result.risk_level.as_deref()) {
                    Ok(risk_level) => (
                        NewHistory::success(result.raw_request, result.raw_response),
                        PollDecision::Finalize {
                            status: result.status.check_status(),
                            score: result.score,
                            risk_level,
                        },
                        false,
                    ),
                    Err(e) => {
                        tracing::error!(
                            check_id = %check_id,
                            provider = %provider,
                            attempt,
                            error = %e,
                            "Unrecognized risk level, result not applied"
                        );
                        let (decision, gave_up) = retry(None);
                        (
                            NewHistory::failure(result.raw_request, result.raw_response, e.to_string()),
                            decision,
                            gave_up,
                        )
                    }
                }
            }
            Ok(result) => {
                let (decision, gave_up) = retry(Some(result.score));
                (
                    NewHistory::success(result.raw_request, result.raw_response),
                    decision,
                    gave_up,
                )
            }
            Err(e) => {
                tracing::warn!(
                    check_id = %check_id,
                    provider = %provider,
                    attempt,
                    error = %e,
                    "Status poll failed"
                );
                let (request, response) = match &e {
                    ScreeningError::Provider(inner) => inner
                        .exchange()
                        .map(|x| (x.request.clone(), x.response.clone()))
                        .unwrap_or_default(),
                    _ => Default::default(),
                };
                let (decision, gave_up) = retry(None);
                (NewHistory::failure(request, response, e.to_string()), decision, gave_up)
            }
        }
    }
}

fn log_batch(joined: Result<ScreeningResult<TriggerOutcome>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(TriggerOutcome::Skipped)) => {
            tracing::debug!("Tick skipped, previous batch still running")
        }
        Ok(Ok(TriggerOutcome::Ran(_))) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Polling batch failed"),
        Err(e) => tracing::error!(error = %e, "Polling batch panicked"),
    }
}
