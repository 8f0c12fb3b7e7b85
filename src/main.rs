//! lnpool - one spendable Lightning balance over many custodial wallets
//!
//! # WARNING
//! - Balances are tracked locally; the custodial providers hold the funds.
//! - A provider can lose or freeze what it holds. The per-wallet cap limits
//!   how much any single provider can take down with it.
//! - Only pool funds you can afford to lose.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use lnpool::cli::commands;
use lnpool::config::Config;

/// Virtual single-balance wallet over pooled custodial Lightning wallets
#[derive(Parser)]
#[command(name = "lnpool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pool status (wallets, balances, pending payments)
    Status,

    /// Pay a BOLT11 payment request from the pool
    Pay {
        /// BOLT11 payment request
        payment_request: String,
    },

    /// Create an invoice that tops up the pool
    Invoice {
        /// Amount in satoshis
        amount: u64,

        /// Memo attached to the invoice
        #[arg(long, default_value = "lnpool deposit")]
        memo: String,
    },

    /// Poll pending payments once and credit the settled ones
    Reconcile,

    /// Run one cap-enforcement pass
    Rebalance,

    /// Run the reconcile + cap-enforcement loop until interrupted
    Run,

    /// Wallet management commands
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Provider management commands
    Provider {
        #[command(subcommand)]
        action: ProviderAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum WalletAction {
    /// Register a wallet hosted by a known provider
    Add {
        /// Provider base URL (must already be registered)
        provider_url: String,

        /// Admin key, authorizes outgoing payments
        #[arg(long)]
        admin_key: String,

        /// Invoice key, authorizes invoice creation and status polls
        #[arg(long)]
        invoice_key: String,

        /// Starting balance in satoshis
        #[arg(long, default_value = "0")]
        balance: u64,
    },

    /// List all pool wallets
    List,
}

#[derive(Subcommand)]
enum ProviderAction {
    /// Register a wallet provider
    Add {
        /// Provider base URL, e.g. https://legend.lnbits.com
        url: String,

        /// Human-readable name
        #[arg(long)]
        name: Option<String>,

        /// Fee rate charged by the provider, in percent
        #[arg(long)]
        fees: Option<f64>,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,

        /// Provider website
        #[arg(long)]
        website_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lnpool=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Status => commands::status(&config).await,
        Commands::Pay { payment_request } => commands::pay(&config, &payment_request).await,
        Commands::Invoice { amount, memo } => commands::invoice(&config, amount, &memo).await,
        Commands::Reconcile => commands::reconcile(&config).await,
        Commands::Rebalance => commands::rebalance(&config).await,
        Commands::Run => commands::run(&config).await,
        Commands::Wallet { action } => match action {
            WalletAction::Add {
                provider_url,
                admin_key,
                invoice_key,
                balance,
            } => {
                commands::wallet_add(&config, &provider_url, &admin_key, &invoice_key, balance)
                    .await
            }
            WalletAction::List => commands::wallet_list(&config).await,
        },
        Commands::Provider { action } => match action {
            ProviderAction::Add {
                url,
                name,
                fees,
                description,
                website_url,
            } => commands::provider_add(&config, &url, name, fees, description, website_url).await,
        },
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
