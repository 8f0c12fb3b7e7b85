//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Durable store settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Wallet provider HTTP settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Per-request timeout; a hung provider surfaces as one failed attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Pool policy settings
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Per-wallet balance cap in satoshis
    #[serde(default = "default_max_balance_per_wallet")]
    pub max_balance_per_wallet: u64,

    /// Reconcile loop interval for the `run` command
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Memo attached to internal rebalancing invoices
    #[serde(default = "default_transfer_memo")]
    pub transfer_memo: String,

    /// Age after which a still-pending payment is logged as stale
    #[serde(default = "default_stale_pending_warn_secs")]
    pub stale_pending_warn_secs: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_balance_per_wallet: default_max_balance_per_wallet(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            transfer_memo: default_transfer_memo(),
            stale_pending_warn_secs: default_stale_pending_warn_secs(),
        }
    }
}

// Default value functions
fn default_store_path() -> String {
    "lnpool.json".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_max_balance_per_wallet() -> u64 {
    1_000_000
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

fn default_transfer_memo() -> String {
    "pool rebalance".to_string()
}

fn default_stale_pending_warn_secs() -> i64 {
    3600
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("store.path", default_store_path())?
            .set_default("provider.timeout_ms", default_timeout_ms() as i64)?
            .set_default(
                "pool.max_balance_per_wallet",
                default_max_balance_per_wallet() as i64,
            )?
            .set_default(
                "pool.reconcile_interval_secs",
                default_reconcile_interval_secs() as i64,
            )?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix LNPOOL_)
            .add_source(
                config::Environment::with_prefix("LNPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.store.path.is_empty() {
            anyhow::bail!("store.path must not be empty");
        }

        if self.provider.timeout_ms == 0 {
            anyhow::bail!("provider.timeout_ms must be positive");
        }

        if self.pool.max_balance_per_wallet == 0 {
            anyhow::bail!("pool.max_balance_per_wallet must be positive");
        }

        if self.pool.reconcile_interval_secs == 0 {
            anyhow::bail!("pool.reconcile_interval_secs must be positive");
        }

        if self.pool.stale_pending_warn_secs <= 0 {
            anyhow::bail!("pool.stale_pending_warn_secs must be positive");
        }

        Ok(())
    }

    /// Get configuration summary for display
    pub fn display(&self) -> String {
        format!(
            r#"Configuration:
  Store:
    path: {}
  Provider:
    timeout: {}ms
  Pool:
    max_balance_per_wallet: {} sats
    reconcile_interval: {}s
    stale_pending_warn_after: {}s
"#,
            self.store.path,
            self.provider.timeout_ms,
            self.pool.max_balance_per_wallet,
            self.pool.reconcile_interval_secs,
            self.pool.stale_pending_warn_secs,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            provider: ProviderConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}
