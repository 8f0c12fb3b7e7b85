//! CLI command implementations

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::invoice;
use crate::pool::Pool;
use crate::provider::LnbitsClient;
use crate::store::{ProviderRecord, WalletStore};

/// Load the store from disk and wire the pool over the LNbits client
async fn open_pool(config: &Config) -> Result<Pool> {
    let store = Arc::new(WalletStore::new(Some(config.store.path.clone())));
    store.load().await?;

    let provider = Arc::new(LnbitsClient::new(Duration::from_millis(
        config.provider.timeout_ms,
    ))?);

    Ok(Pool::new(store, provider, &config.pool))
}

async fn open_store(config: &Config) -> Result<WalletStore> {
    let store = WalletStore::new(Some(config.store.path.clone()));
    store.load().await?;
    Ok(store)
}

/// Show pool status: totals, wallet table, pending payments
pub async fn status(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let status = pool.status().await;

    println!("\n=== POOL STATUS ===\n");
    println!("Wallets:          {}", status.wallets);
    println!("Total balance:    {} sats", status.total_balance);
    println!("Pending payments: {}", status.pending_payments);

    let wallets = pool.store().get_all_wallets().await;
    if !wallets.is_empty() {
        println!();
        println!("{:<6} {:>16}  {}", "ID", "BALANCE (sats)", "PROVIDER");
        println!("{}", "-".repeat(60));
        for wallet in &wallets {
            println!(
                "{:<6} {:>16}  {}",
                wallet.id, wallet.balance, wallet.provider_url
            );
        }
    }

    let pending = pool.store().get_pending_payments().await;
    if !pending.is_empty() {
        println!("\n=== PENDING PAYMENTS ===\n");
        let now = chrono::Utc::now();
        for payment in &pending {
            println!(
                "{}  {:>10} sats  wallet {}  {}s old",
                short_hash(&payment.payment_hash),
                payment.amount,
                payment.wallet_id,
                payment.age_secs(now),
            );
        }
    }

    println!();
    Ok(())
}

/// Pay a BOLT11 payment request from the pool
pub async fn pay(config: &Config, payment_request: &str) -> Result<()> {
    let amount = invoice::amount_sats(payment_request)?;
    let pool = open_pool(config).await?;

    if !pool.is_sendable(amount).await {
        info!(
            "No single wallet covers {} sats; consolidation will run first",
            amount
        );
    }

    let payment_hash = pool.pay(payment_request).await?;
    println!("Paid {} sats", amount);
    println!("Payment hash: {}", payment_hash);
    Ok(())
}

/// Create an invoice that tops up the pool's emptiest wallet
pub async fn invoice(config: &Config, amount_sats: u64, memo: &str) -> Result<()> {
    let pool = open_pool(config).await?;
    let created = pool.create_invoice(amount_sats, memo).await?;

    println!("Payment request: {}", created.payment_request);
    println!("Payment hash:    {}", created.payment_hash);
    println!();
    println!("The pool is credited once the invoice is paid and a reconcile pass runs.");
    Ok(())
}

/// Poll pending payments once and credit the settled ones
pub async fn reconcile(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let settled = pool.reconcile().await?;
    let still_pending = pool.status().await.pending_payments;

    println!(
        "Settled {} payment(s), {} still pending",
        settled, still_pending
    );
    Ok(())
}

/// Run one cap-enforcement pass
pub async fn rebalance(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;

    match pool.enforce_cap().await? {
        Some(payment_hash) => println!("Rebalanced one over-cap wallet ({})", payment_hash),
        None => println!(
            "All wallets within the {} sat cap",
            config.pool.max_balance_per_wallet
        ),
    }
    Ok(())
}

/// Run the reconcile + cap-enforcement loop until interrupted
pub async fn run(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let mut ticker = tokio::time::interval(Duration::from_secs(
        config.pool.reconcile_interval_secs,
    ));

    info!(
        "Pool loop started: reconcile + cap enforcement every {}s",
        config.pool.reconcile_interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match pool.reconcile().await {
                    Ok(0) => {}
                    Ok(settled) => info!("Reconciled {} settled payment(s)", settled),
                    Err(e) if e.is_transient() => {
                        warn!("Reconcile pass failed, retrying next tick: {}", e)
                    }
                    Err(e) => return Err(e.into()),
                }

                match pool.enforce_cap().await {
                    Ok(Some(payment_hash)) => {
                        info!("Rebalanced over-cap wallet ({})", payment_hash)
                    }
                    Ok(None) => {}
                    // Needs an operator: add a wallet or raise the cap
                    Err(e) if e.is_operator_alert() => {
                        error!("Cap enforcement needs attention: {}", e)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

/// Register a wallet hosted by an already-registered provider
pub async fn wallet_add(
    config: &Config,
    provider_url: &str,
    admin_key: &str,
    invoice_key: &str,
    balance: u64,
) -> Result<()> {
    let store = open_store(config).await?;

    let wallet = store
        .add_wallet(provider_url, admin_key, invoice_key, balance)
        .await?;
    println!(
        "Added wallet {} at {} with {} sats",
        wallet.id, wallet.provider_url, wallet.balance
    );
    Ok(())
}

/// List all pool wallets
pub async fn wallet_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;

    let wallets = store.get_all_wallets().await;
    if wallets.is_empty() {
        println!("No wallets registered.");
        return Ok(());
    }

    println!("\n=== POOL WALLETS ===\n");
    println!(
        "{:<6} {:>16}  {:<30} {}",
        "ID", "BALANCE (sats)", "PROVIDER", "INVOICE KEY"
    );
    println!("{}", "-".repeat(80));

    for wallet in &wallets {
        println!(
            "{:<6} {:>16}  {:<30} {}",
            wallet.id,
            wallet.balance,
            wallet.provider_url,
            mask_key(&wallet.invoice_key),
        );
    }

    println!();
    Ok(())
}

/// Register a wallet provider
pub async fn provider_add(
    config: &Config,
    url: &str,
    name: Option<String>,
    fees: Option<f64>,
    description: Option<String>,
    website_url: Option<String>,
) -> Result<()> {
    let store = open_store(config).await?;

    store
        .add_provider(ProviderRecord {
            url: url.to_string(),
            has_lost_funds: false,
            fees,
            name,
            description,
            website_url,
        })
        .await?;
    println!("Registered provider {}", url);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}

fn short_hash(hash: &str) -> String {
    if hash.len() > 16 {
        format!("{}...", &hash[..16])
    } else {
        hash.to_string()
    }
}

fn mask_key(key: &str) -> String {
    if key.len() > 6 {
        format!("{}...", &key[..6])
    } else {
        "***".to_string()
    }
}
