//! Integration tests for the CLI context
//!
//! These run the commands against a file-backed database; none of them
//! reaches a provider.

use std::sync::Arc;
use std::time::Duration;

use aml_cli::commands::{self, CurrencyArgs, HistoryArgs};
use aml_cli::AppContext;
use aml_core::{CredentialKey, CredentialSet, ProviderId};
use aml_providers::ReqwestTransport;
use aml_screening::ScreeningConfig;
use aml_store::ScreeningStore;
use tempfile::TempDir;

async fn context(dir: &TempDir, configure: impl FnOnce(&mut ScreeningConfig)) -> AppContext {
    let mut config = ScreeningConfig {
        database_url: format!("sqlite:{}?mode=rwc", dir.path().join("aml.db").display()),
        ..Default::default()
    };
    configure(&mut config);
    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(1)).unwrap());
    AppContext::with_transport(config, transport).await.unwrap()
}

/// Test: reference data survives a restart
#[tokio::test]
async fn test_reference_data_persists() {
    let dir = TempDir::new().unwrap();

    {
        let ctx = context(&dir, |_| {}).await;
        commands::user_add(&ctx, 7, "+03:00").await.unwrap();
        commands::currency_add(
            &ctx,
            CurrencyArgs {
                provider: "bitok".into(),
                currency_id: 3,
                code: "usdt".into(),
                asset: "USDT".into(),
                network: "TRX".into(),
                token_id: Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into()),
                family: "tron".into(),
            },
        )
        .await
        .unwrap();
    }

    let ctx = context(&dir, |_| {}).await;
    assert_eq!(ctx.store.user_utc_offset(7).await.unwrap(), Some(3 * 3600));

    let currencies = ctx.screening.get_supported_currencies("bitok").await.unwrap();
    assert_eq!(currencies.len(), 1);
    assert_eq!(currencies[0].code, "USDT");
    assert!(commands::currencies(&ctx, "bitok").await.is_ok());
}

/// Test: disabled providers disappear from every surface
#[tokio::test]
async fn test_disabled_provider_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, |config| config.providers.amlbot.enabled = false).await;

    assert_eq!(ctx.screening.get_all_active_providers(), vec![ProviderId::Bitok]);
    assert!(commands::currencies(&ctx, "amlbot").await.is_err());
    assert!(commands::credentials_show(&ctx, 1, "amlbot").await.is_err());
}

/// Test: empty database reads and audits cleanly
#[tokio::test]
async fn test_empty_history_and_audit() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, |_| {}).await;

    let args = HistoryArgs {
        page: 1,
        per_page: 20,
        ..Default::default()
    };
    commands::history(&ctx, 0, args).await.unwrap();
    commands::audit(&ctx).await.unwrap();

    let bad_status = HistoryArgs {
        status: Some("done".into()),
        page: 1,
        per_page: 20,
        ..Default::default()
    };
    assert!(commands::history(&ctx, 0, bad_status).await.is_err());
}

/// Test: stored credentials can be shown masked and deleted
#[tokio::test]
async fn test_credentials_show_and_delete() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, |_| {}).await;

    let set = CredentialSet::new()
        .with(CredentialKey::AccessKeyId, "AKID")
        .with(CredentialKey::SecretKey, "very-secret");
    ctx.store
        .save_credentials(5, ProviderId::Bitok, &set)
        .await
        .unwrap();

    let masked = ctx.credentials.get(5, "bitok").await.unwrap();
    assert_eq!(masked[&CredentialKey::SecretKey], "*******cret");

    commands::credentials_delete(&ctx, 5, "bitok").await.unwrap();
    assert!(ctx
        .store
        .credentials(5, ProviderId::Bitok)
        .await
        .unwrap()
        .is_empty());
}
