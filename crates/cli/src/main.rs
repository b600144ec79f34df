//! amlctl - AML screening CLI entry point

use aml_cli::commands::{self, CurrencyArgs, HistoryArgs};
use aml_cli::AppContext;
use aml_core::UserId;
use aml_screening::ScoreRequest;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "amlctl")]
#[command(about = "AML transaction screening", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create database tables
    Migrate,

    /// List enabled providers
    Providers,

    /// List currencies a provider supports
    Currencies {
        /// Provider slug (amlbot, bitok)
        provider: String,
    },

    /// Add or replace provider currency metadata
    CurrencyAdd {
        /// Provider slug
        provider: String,
        /// Platform currency ID
        currency_id: i64,
        /// Platform ticker
        code: String,
        /// Asset code as the provider names it
        #[arg(long)]
        asset: String,
        /// Provider network code
        #[arg(long)]
        network: String,
        /// Token identifier or contract address
        #[arg(long)]
        token_id: Option<String>,
        /// Address family (bitcoin, evm, tron)
        #[arg(long)]
        family: String,
    },

    /// Add or update a user
    UserAdd {
        /// User ID
        user: UserId,
        /// UTC offset, e.g. +03:00
        #[arg(long, default_value = "+00:00", allow_hyphen_values = true)]
        utc_offset: String,
    },

    /// Screen a transaction
    Score {
        /// User ID
        user: UserId,
        /// Provider slug
        #[arg(long)]
        provider: String,
        /// Platform currency ID
        #[arg(long)]
        currency_id: i64,
        /// Transaction hash
        #[arg(long)]
        tx: String,
        /// Counterparty address
        #[arg(long)]
        address: String,
        /// deposit or withdrawal
        #[arg(long, default_value = "deposit")]
        direction: String,
    },

    /// Poll pending checks
    Poll {
        /// Run a single batch and exit
        #[arg(long)]
        once: bool,
    },

    /// List checks with their history
    History {
        /// User whose timezone applies to date filters
        #[arg(long, default_value = "0")]
        viewer: UserId,
        /// Filter by owner
        #[arg(long)]
        user: Option<UserId>,
        /// Filter by provider slug
        #[arg(long)]
        provider: Option<String>,
        /// Filter by status (pending, success, failed)
        #[arg(long)]
        status: Option<String>,
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        per_page: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Manage provider credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },

    /// Verify queue and history consistency
    Audit,
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// Verify against the provider, then store
    Set {
        user: UserId,
        provider: String,
        /// key=value pairs, e.g. access_key_id=AKID secret_key=...
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Show stored keys with masked values
    Show { user: UserId, provider: String },
    /// Remove stored credentials
    Delete { user: UserId, provider: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Create application context
    let ctx = AppContext::new(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Migrate => commands::migrate(&ctx).await?,

        Commands::Providers => commands::providers(&ctx),

        Commands::Currencies { provider } => commands::currencies(&ctx, &provider).await?,

        Commands::CurrencyAdd {
            provider,
            currency_id,
            code,
            asset,
            network,
            token_id,
            family,
        } => {
            let args = CurrencyArgs {
                provider,
                currency_id,
                code,
                asset,
                network,
                token_id,
                family,
            };
            commands::currency_add(&ctx, args).await?;
        }

        Commands::UserAdd { user, utc_offset } => {
            commands::user_add(&ctx, user, &utc_offset).await?;
        }

        Commands::Score {
            user,
            provider,
            currency_id,
            tx,
            address,
            direction,
        } => {
            let request = ScoreRequest {
                tx_id: tx,
                currency_id,
                provider,
                direction: commands::direction(&direction)?,
                output_address: address,
            };
            commands::score(&ctx, user, request).await?;
        }

        Commands::Poll { once } => commands::poll(&ctx, once).await?,

        Commands::History {
            viewer,
            user,
            provider,
            status,
            from,
            to,
            page,
            per_page,
            json,
        } => {
            let args = HistoryArgs {
                user,
                provider,
                status,
                from,
                to,
                page,
                per_page,
                json,
            };
            commands::history(&ctx, viewer, args).await?;
        }

        Commands::Credentials { action } => match action {
            CredentialsAction::Set {
                user,
                provider,
                pairs,
            } => commands::credentials_set(&ctx, user, &provider, &pairs).await?,
            CredentialsAction::Show { user, provider } => {
                commands::credentials_show(&ctx, user, &provider).await?
            }
            CredentialsAction::Delete { user, provider } => {
                commands::credentials_delete(&ctx, user, &provider).await?
            }
        },

        Commands::Audit => commands::audit(&ctx).await?,
    }

    Ok(())
}
