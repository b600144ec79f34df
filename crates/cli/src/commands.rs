//! CLI commands

use chrono::{FixedOffset, NaiveDate};

use aml_core::{
    BlockchainFamily, CheckStatus, CredentialKey, CredentialSet, Direction, Pagination,
    ProviderCurrency, ProviderId, UserId,
};
use aml_screening::{HistoryFilter, ScoreRequest, TriggerOutcome};
use aml_store::ScreeningStore;

use crate::context::AppContext;

/// Apply the schema (also done implicitly on every start)
pub async fn migrate(ctx: &AppContext) -> Result<(), anyhow::Error> {
    ctx.store.migrate().await?;
    println!("✅ Schema up to date ({})", ctx.config.database_url);
    Ok(())
}

/// Register a user with the timezone used for history date filters
pub async fn user_add(ctx: &AppContext, user_id: UserId, utc_offset: &str) -> Result<(), anyhow::Error> {
    let offset: FixedOffset = utc_offset
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid UTC offset '{}': {}", utc_offset, e))?;
    ctx.store
        .upsert_user(user_id, offset.local_minus_utc())
        .await?;
    println!("✅ User {} saved (UTC{})", user_id, offset);
    Ok(())
}

/// Currency metadata as entered on the command line
pub struct CurrencyArgs {
    pub provider: String,
    pub currency_id: i64,
    pub code: String,
    pub asset: String,
    pub network: String,
    pub token_id: Option<String>,
    pub family: String,
}

pub async fn currency_add(ctx: &AppContext, args: CurrencyArgs) -> Result<(), anyhow::Error> {
    let currency = ProviderCurrency {
        provider: ProviderId::from_slug(&args.provider)?,
        currency_id: args.currency_id,
        code: args.code.to_uppercase(),
        asset: args.asset,
        network: args.network,
        token_id: args.token_id,
        family: args.family.parse::<BlockchainFamily>()?,
    };
    ctx.store.upsert_currency(&currency).await?;
    println!(
        "✅ {} currency {} ({}) on {} saved",
        currency.provider, currency.currency_id, currency.code, currency.network
    );
    Ok(())
}

pub fn providers(ctx: &AppContext) {
    let active = ctx.screening.get_all_active_providers();
    if active.is_empty() {
        println!("No providers enabled");
        return;
    }
    println!("Active providers:");
    for provider in active {
        println!("  {}", provider);
    }
}

pub async fn currencies(ctx: &AppContext, provider: &str) -> Result<(), anyhow::Error> {
    let currencies = ctx.screening.get_supported_currencies(provider).await?;
    if currencies.is_empty() {
        println!("No currencies configured for {}", provider);
        return Ok(());
    }

    println!("{:>6} {:<8} {:<8} {:<8} {:<8} TOKEN", "ID", "CODE", "ASSET", "NETWORK", "FAMILY");
    for c in currencies {
        println!(
            "{:>6} {:<8} {:<8} {:<8} {:<8} {}",
            c.currency_id,
            c.code,
            c.asset,
            c.network,
            c.family,
            c.token_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Screen one transaction
pub async fn score(ctx: &AppContext, user_id: UserId, request: ScoreRequest) -> Result<(), anyhow::Error> {
    let check = ctx.screening.score_transaction(user_id, request).await?;

    println!(
        "✅ Check {} via {}: status={} score={} risk={}",
        check.id, check.provider, check.status, check.score, check.risk_level
    );
    if check.is_pending() {
        println!("   Queued for status polling");
    }
    Ok(())
}

/// Run the status poller until Ctrl-C, or a single batch with `once`
pub async fn poll(ctx: &AppContext, once: bool) -> Result<(), anyhow::Error> {
    if once {
        match ctx.poller.trigger().await? {
            TriggerOutcome::Ran(report) => println!(
                "✅ Batch: fetched={} succeeded={} failed={} retried={} unrecorded={}",
                report.fetched, report.succeeded, report.failed, report.retried, report.unrecorded
            ),
            TriggerOutcome::Skipped => println!("Another batch is running"),
        }
        return Ok(());
    }

    println!(
        "Polling every {}s (Ctrl-C to stop)",
        ctx.config.poll_interval_secs
    );
    ctx.poller
        .clone()
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;
    println!("✅ Poller stopped");
    Ok(())
}

/// History query as entered on the command line
#[derive(Default)]
pub struct HistoryArgs {
    pub user: Option<UserId>,
    pub provider: Option<String>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
    pub json: bool,
}

pub async fn history(ctx: &AppContext, viewer: UserId, args: HistoryArgs) -> Result<(), anyhow::Error> {
    let filter = HistoryFilter {
        user_id: args.user,
        provider: args.provider.as_deref().map(ProviderId::from_slug).transpose()?,
        status: args.status.as_deref().map(str::parse::<CheckStatus>).transpose()?,
        date_from: args.from,
        date_to: args.to,
    };
    let page = ctx
        .history
        .get_check_history(viewer, &filter, Pagination::new(args.page, args.per_page))
        .await?;

    if args.json {
        let checks: Vec<_> = page
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "check": item.check,
                    "attempts": item.history.len(),
                    "last_error": item.history.last().and_then(|h| h.error.clone()),
                })
            })
            .collect();
        let body = serde_json::json!({
            "page": page.page,
            "per_page": page.per_page,
            "total": page.total,
            "checks": checks,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("No checks found");
        return Ok(());
    }

    println!(
        "Checks (page {}/{}, {} total):",
        page.page,
        page.total_pages(),
        page.total
    );
    println!("{:-<110}", "");
    println!(
        "{:<36} {:>6} {:<8} {:<8} {:>7} {:<9} {:>3} TX",
        "ID", "USER", "PROVIDER", "STATUS", "SCORE", "RISK", "ATT"
    );
    println!("{:-<110}", "");
    for item in &page.items {
        let check = &item.check;
        println!(
            "{:<36} {:>6} {:<8} {:<8} {:>7} {:<9} {:>3} {}",
            check.id,
            check.user_id,
            check.provider,
            check.status,
            check.score,
            check.risk_level,
            item.history.len(),
            check.tx_id
        );
    }
    Ok(())
}

/// Parse `key=value` pairs into a credential set
pub fn parse_credentials(pairs: &[String]) -> Result<CredentialSet, anyhow::Error> {
    let mut set = CredentialSet::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", pair))?;
        set.insert(key.parse::<CredentialKey>()?, value.trim());
    }
    Ok(set)
}

pub async fn credentials_set(
    ctx: &AppContext,
    user_id: UserId,
    provider: &str,
    pairs: &[String],
) -> Result<(), anyhow::Error> {
    let set = parse_credentials(pairs)?;
    ctx.credentials.update(user_id, provider, set).await?;
    println!("✅ Credentials for user {} on {} verified and saved", user_id, provider);
    Ok(())
}

pub async fn credentials_show(ctx: &AppContext, user_id: UserId, provider: &str) -> Result<(), anyhow::Error> {
    let masked = ctx.credentials.get(user_id, provider).await?;
    if masked.is_empty() {
        println!("No credentials stored for user {} on {}", user_id, provider);
        return Ok(());
    }
    for (key, value) in masked {
        println!("  {:<14} {}", key, value);
    }
    Ok(())
}

pub async fn credentials_delete(ctx: &AppContext, user_id: UserId, provider: &str) -> Result<(), anyhow::Error> {
    if ctx.credentials.delete(user_id, provider).await? {
        println!("✅ Credentials for user {} on {} deleted", user_id, provider);
    } else {
        println!("No credentials stored for user {} on {}", user_id, provider);
    }
    Ok(())
}

/// Check queue/history consistency; fails when anything is off
pub async fn audit(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let report = ctx.store.audit().await?;

    println!(
        "Checks: {} (pending {}, queued {})",
        report.checks, report.pending, report.queued
    );
    if report.is_clean() {
        println!("✅ Queue and history are consistent");
        return Ok(());
    }

    let sections = [
        ("Pending without queue entry", &report.pending_without_queue),
        ("Queued but not pending", &report.queued_not_pending),
        ("Attempt numbering gaps", &report.history_gaps),
        ("Queue counter mismatches", &report.attempt_mismatches),
    ];
    for (title, ids) in sections {
        if ids.is_empty() {
            continue;
        }
        println!("❌ {} ({}):", title, ids.len());
        for id in ids {
            println!("   {}", id);
        }
    }
    anyhow::bail!("Audit found inconsistencies")
}

/// Parse a direction argument
pub fn direction(value: &str) -> Result<Direction, anyhow::Error> {
    Ok(value.parse::<Direction>()?)
}
