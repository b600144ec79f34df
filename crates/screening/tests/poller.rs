//! Status poller: retry accounting, finalization and the batch guard

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::Semaphore;

use aml_core::{CheckId, CheckStatus, RiskLevel, Score};
use aml_providers::ProviderStatus;
use aml_screening::{BatchReport, PollerSettings, StatusPoller, TriggerOutcome};
use aml_store::{ScreeningStore, SqliteStore};

use common::*;

async fn attempts(store: &SqliteStore, id: CheckId) -> Vec<u32> {
    store
        .history_for(&[id])
        .await
        .unwrap()
        .iter()
        .map(|h| h.attempt)
        .collect()
}

async fn ran(h: &Harness) -> BatchReport {
    match h.poller.trigger().await.unwrap() {
        TriggerOutcome::Ran(report) => report,
        TriggerOutcome::Skipped => panic!("batch unexpectedly skipped"),
    }
}

#[tokio::test]
async fn test_pending_then_terminal() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(pending(dec!(20)))
        .on_status(pending(dec!(30)))
        .on_status(result(ProviderStatus::Success, dec!(64.25), Some("medium")));
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    let report = ran(&h).await;
    assert_eq!(report.retried, 1);
    let interim = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(interim.status, CheckStatus::Pending);
    assert_eq!(interim.score.value(), dec!(20));
    assert_eq!(interim.risk_level, RiskLevel::Undefined);

    ran(&h).await;
    let report = ran(&h).await;
    assert_eq!(report.succeeded, 1);

    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Success);
    assert_eq!(done.score.value(), dec!(64.25));
    assert_eq!(done.risk_level, RiskLevel::Medium);
    assert!(h.store.queue_entry(check.id).await?.is_none());
    assert_eq!(attempts(&h.store, check.id).await, vec![1, 2, 3, 4]);

    // Nothing left to poll
    assert_eq!(ran(&h).await.fetched, 0);
    assert_eq!(h.client.status_calls.load(Ordering::SeqCst), 3);
    assert!(h.store.audit().await?.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_exhausted_attempts_fail_with_zero_score() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(pending(dec!(40)))
        .on_status(pending(dec!(45)));
    let h = harness(client, settings(3)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    assert_eq!(ran(&h).await.retried, 1);
    let report = ran(&h).await;
    assert_eq!(report.failed, 1);

    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Failed);
    assert_eq!(done.score, Score::ZERO);
    assert_eq!(done.risk_level, RiskLevel::Undefined);
    assert!(h.store.queue_entry(check.id).await?.is_none());
    assert_eq!(attempts(&h.store, check.id).await, vec![1, 2, 3]);

    assert_eq!(ran(&h).await.fetched, 0);
    assert!(h.store.audit().await?.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_lowered_ceiling_fails_entry_without_calling_provider() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(pending(dec!(40)));
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;
    assert_eq!(ran(&h).await.retried, 1);

    // Restart with a ceiling the entry has already reached
    let poller = Arc::new(StatusPoller::new(h.store.clone(), h.registry.clone(), settings(2)));
    let report = match poller.trigger().await? {
        TriggerOutcome::Ran(report) => report,
        TriggerOutcome::Skipped => panic!("batch unexpectedly skipped"),
    };
    assert_eq!(report.fetched, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(h.client.status_calls.load(Ordering::SeqCst), 1);

    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Failed);
    assert_eq!(done.score, Score::ZERO);
    assert_eq!(done.risk_level, RiskLevel::Undefined);

    let history = h.store.history_for(&[check.id]).await?;
    assert_eq!(attempts(&h.store, check.id).await, vec![1, 2, 3]);
    assert!(history[2].request.is_empty());
    assert!(history[2].error.as_deref().unwrap_or_default().contains("ceiling"));
    assert!(h.store.audit().await?.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_on_last_attempt_is_a_verdict() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(result(ProviderStatus::Failure, dec!(0), None));
    let h = harness(client, settings(2)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    let report = ran(&h).await;
    assert_eq!(report.failed, 1);

    // The provider answered, so the row is a plain success exchange
    let history = h.store.history_for(&[check.id]).await?;
    assert_eq!(history.len(), 2);
    assert!(history[1].error.is_none());
    assert!(!history[1].response.is_empty());
    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_transport_errors_count_toward_ceiling() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(http_error(503))
        .on_status(http_error(502));
    let h = harness(client, settings(3)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    ran(&h).await;
    let interim = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(interim.score.value(), dec!(5));
    assert_eq!(h.store.queue_entry(check.id).await?.expect("queued").attempts, 2);

    ran(&h).await;

    let history = h.store.history_for(&[check.id]).await?;
    assert_eq!(history.len(), 3);
    assert!(history[0].error.is_none());
    for row in &history[1..] {
        assert!(row.error.as_deref().unwrap_or_default().contains("HTTP"), "{:?}", row.error);
        assert_eq!(row.response, b"unavailable");
    }
    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Failed);
    assert!(h.store.audit().await?.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_risk_is_recorded_and_retried() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(result(ProviderStatus::Success, dec!(90), Some("purple")))
        .on_status(result(ProviderStatus::Success, dec!(90), Some("critical")));
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    assert_eq!(ran(&h).await.retried, 1);
    let interim = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(interim.status, CheckStatus::Pending);

    let history = h.store.history_for(&[check.id]).await?;
    assert!(history[1].error.as_deref().unwrap_or_default().contains("purple"));

    assert_eq!(ran(&h).await.succeeded, 1);
    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.risk_level, RiskLevel::Critical);
    assert_eq!(attempts(&h.store, check.id).await, vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_status_finalizes_failed() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(result(ProviderStatus::Failure, dec!(0), None));
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    assert_eq!(ran(&h).await.failed, 1);
    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Failed);
    assert!(h.store.queue_entry(check.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_timeout_counts_as_attempt() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(pending(dec!(50)))
        .delayed(Duration::from_secs(2));
    let settings = PollerSettings {
        request_timeout: Duration::from_millis(50),
        ..settings(10)
    };
    let h = harness(client, settings).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    assert_eq!(ran(&h).await.retried, 1);

    let history = h.store.history_for(&[check.id]).await?;
    assert_eq!(history.len(), 2);
    assert!(history[1].error.as_deref().unwrap_or_default().contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn test_second_trigger_is_noop_while_batch_active() -> anyhow::Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(result(ProviderStatus::Success, dec!(10), Some("low")))
        .gated(gate.clone());
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    let poller = h.poller.clone();
    let first = tokio::spawn(async move { poller.trigger().await });

    while h.client.status_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(h.poller.guard().is_active());

    assert_eq!(h.poller.trigger().await?, TriggerOutcome::Skipped);

    gate.add_permits(1);
    let outcome = first.await??;
    assert!(matches!(outcome, TriggerOutcome::Ran(BatchReport { succeeded: 1, .. })));
    assert!(!h.poller.guard().is_active());

    assert_eq!(h.client.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(attempts(&h.store, check.id).await, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn test_batch_handles_many_entries() -> anyhow::Result<()> {
    let mut client = ScriptedClient::new();
    for _ in 0..12 {
        client = client.on_init(pending(dec!(1)));
    }
    for _ in 0..12 {
        client = client.on_status(result(ProviderStatus::Success, dec!(3), Some("none")));
    }
    let settings = PollerSettings {
        concurrency: 3,
        ..settings(10)
    };
    let h = harness(client, settings).await;
    for _ in 0..12 {
        h.service.score_transaction(USER, btc_request()).await?;
    }

    let report = ran(&h).await;
    assert_eq!(report.fetched, 12);
    assert_eq!(report.succeeded, 12);

    let audit = h.store.audit().await?;
    assert!(audit.is_clean());
    assert_eq!(audit.pending, 0);
    assert_eq!(audit.queued, 0);
    Ok(())
}

#[tokio::test]
async fn test_batch_never_exceeds_concurrency() -> anyhow::Result<()> {
    let mut client = ScriptedClient::new().delayed(Duration::from_millis(30));
    for _ in 0..12 {
        client = client
            .on_init(pending(dec!(1)))
            .on_status(result(ProviderStatus::Success, dec!(3), Some("low")));
    }
    let settings = PollerSettings {
        concurrency: 3,
        ..settings(10)
    };
    let h = harness(client, settings).await;
    for _ in 0..12 {
        h.service.score_transaction(USER, btc_request()).await?;
    }

    assert_eq!(ran(&h).await.succeeded, 12);

    let peak = h.client.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "{peak} status calls ran at once");
    assert!(peak > 1, "status calls never overlapped");
    assert_eq!(h.client.in_flight.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_file_database_records_every_poll() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut client = ScriptedClient::new().delayed(Duration::from_millis(5));
    for _ in 0..40 {
        client = client.on_init(pending(dec!(1))).on_status(pending(dec!(2)));
    }
    let settings = PollerSettings {
        concurrency: 16,
        ..settings(10)
    };
    let h = file_harness(&dir, client, settings).await;
    for _ in 0..40 {
        h.service.score_transaction(USER, btc_request()).await?;
    }

    let report = ran(&h).await;
    assert_eq!(report.fetched, 40);
    assert_eq!(report.retried, 40);
    assert_eq!(report.unrecorded, 0);

    let audit = h.store.audit().await?;
    assert!(audit.is_clean());
    assert_eq!(audit.queued, 40);
    for pending in h.store.pending_entries(100).await? {
        assert_eq!(pending.entry.attempts, 2);
    }
    Ok(())
}

#[tokio::test]
async fn test_run_stops_on_shutdown() -> anyhow::Result<()> {
    let client = ScriptedClient::new()
        .on_init(pending(dec!(5)))
        .on_status(result(ProviderStatus::Success, dec!(10), Some("low")));
    let h = harness(client, settings(10)).await;
    let check = h.service.score_transaction(USER, btc_request()).await?;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let runner = tokio::spawn(h.poller.clone().run(async move {
        let _ = rx.await;
    }));

    // The first tick fires immediately
    while h.store.queue_entry(check.id).await?.is_some() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tx.send(()).ok();
    tokio::time::timeout(Duration::from_secs(5), runner).await??;

    let done = h.store.get_check(check.id).await?.expect("stored");
    assert_eq!(done.status, CheckStatus::Success);
    Ok(())
}
