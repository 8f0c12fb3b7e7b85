//! Durable state for the wallet pool
//!
//! One JSON snapshot holds three collections: providers, wallets and payment
//! records. Wallets live in a BTreeMap keyed by id, so every balance-selection
//! query breaks ties deterministically within one snapshot (first match =
//! lowest id). Payment records are kept in insertion order and are not keyed
//! by hash: the two legs of an internal transfer share one payment hash.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub mod records;

// Re-exports
pub use records::{PaymentRecord, ProviderRecord, WalletRecord};

/// Snapshot contents, serialized as a whole
#[derive(Debug, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    providers: BTreeMap<String, ProviderRecord>,
    #[serde(default)]
    wallets: BTreeMap<u64, WalletRecord>,
    #[serde(default)]
    payments: Vec<PaymentRecord>,
    #[serde(default = "default_next_wallet_id")]
    next_wallet_id: u64,
}

fn default_next_wallet_id() -> u64 {
    1
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            wallets: BTreeMap::new(),
            payments: Vec::new(),
            next_wallet_id: default_next_wallet_id(),
        }
    }
}

impl StoreState {
    /// First wallet (lowest id) holding the maximum balance
    fn max_wallet(&self) -> Option<&WalletRecord> {
        let mut best: Option<&WalletRecord> = None;
        for wallet in self.wallets.values() {
            let better = match best {
                Some(current) => wallet.balance > current.balance,
                None => true,
            };
            if better {
                best = Some(wallet);
            }
        }
        best
    }

    /// First wallet (lowest id) holding the minimum balance
    fn min_wallet(&self) -> Option<&WalletRecord> {
        let mut best: Option<&WalletRecord> = None;
        for wallet in self.wallets.values() {
            let better = match best {
                Some(current) => wallet.balance < current.balance,
                None => true,
            };
            if better {
                best = Some(wallet);
            }
        }
        best
    }

    /// First wallet holding the largest balance strictly below the maximum
    ///
    /// None when the pool is empty, holds a single wallet, or every wallet
    /// is tied at the maximum.
    fn second_largest_wallet(&self) -> Option<&WalletRecord> {
        let max = self.max_wallet()?.balance;
        let mut best: Option<&WalletRecord> = None;
        for wallet in self.wallets.values().filter(|w| w.balance < max) {
            let better = match best {
                Some(current) => wallet.balance > current.balance,
                None => true,
            };
            if better {
                best = Some(wallet);
            }
        }
        best
    }
}

/// Durable store of providers, wallets and payment records
pub struct WalletStore {
    state: Arc<RwLock<StoreState>>,
    persistence_path: Option<String>,
}

impl WalletStore {
    /// Create an empty store, persisted to `persistence_path` if given
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            persistence_path,
        }
    }

    /// Load the snapshot from disk, replacing in-memory state
    ///
    /// A missing file yields an empty store.
    pub async fn load(&self) -> Result<()> {
        if let Some(path) = &self.persistence_path {
            if Path::new(path).exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::StorePersistence(e.to_string()))?;

                let loaded: StoreState = serde_json::from_str(&data)
                    .map_err(|e| Error::StorePersistence(e.to_string()))?;

                let mut state = self.state.write().await;
                *state = loaded;

                info!(
                    "Loaded {} wallets, {} providers, {} payments from {}",
                    state.wallets.len(),
                    state.providers.len(),
                    state.payments.len(),
                    path
                );
            }
        }
        Ok(())
    }

    /// Write the snapshot to a temp file and rename it over the target, so
    /// every persisted state is all-or-nothing
    async fn save(&self, state: &StoreState) -> Result<()> {
        if let Some(path) = &self.persistence_path {
            let data = serde_json::to_string_pretty(state)
                .map_err(|e| Error::StorePersistence(e.to_string()))?;

            let tmp = format!("{}.tmp", path);
            tokio::fs::write(&tmp, data)
                .await
                .map_err(|e| Error::StorePersistence(e.to_string()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .map_err(|e| Error::StorePersistence(e.to_string()))?;

            debug!("Saved pool state to {}", path);
        }
        Ok(())
    }

    // === Provisioning ===

    /// Register a provider
    pub async fn add_provider(&self, record: ProviderRecord) -> Result<()> {
        url::Url::parse(&record.url)
            .map_err(|e| Error::Config(format!("Invalid provider URL {}: {}", record.url, e)))?;

        let mut state = self.state.write().await;
        if state.providers.contains_key(&record.url) {
            return Err(Error::Config(format!(
                "Provider already registered: {}",
                record.url
            )));
        }

        info!("Registered provider {}", record.url);
        state.providers.insert(record.url.clone(), record);
        self.save(&state).await
    }

    /// Register a wallet hosted by an already-registered provider
    pub async fn add_wallet(
        &self,
        provider_url: &str,
        admin_key: &str,
        invoice_key: &str,
        balance: u64,
    ) -> Result<WalletRecord> {
        let mut state = self.state.write().await;
        if !state.providers.contains_key(provider_url) {
            return Err(Error::Config(format!(
                "Unknown provider URL: {}",
                provider_url
            )));
        }

        let id = state.next_wallet_id;
        state.next_wallet_id += 1;

        let record = WalletRecord {
            id,
            provider_url: provider_url.to_string(),
            balance,
            admin_key: admin_key.to_string(),
            invoice_key: invoice_key.to_string(),
        };
        state.wallets.insert(id, record.clone());

        info!(
            "Registered wallet {} at {} with {} sats",
            id, provider_url, balance
        );
        self.save(&state).await?;

        Ok(record)
    }

    // === Accessors ===

    /// Get a wallet by id
    pub async fn get_wallet(&self, id: u64) -> Result<WalletRecord> {
        let state = self.state.read().await;
        state.wallets.get(&id).cloned().ok_or(Error::WalletNotFound(id))
    }

    /// Get all wallets, ordered by id
    pub async fn get_all_wallets(&self) -> Vec<WalletRecord> {
        let state = self.state.read().await;
        state.wallets.values().cloned().collect()
    }

    /// Get all providers, ordered by URL
    pub async fn get_all_providers(&self) -> Vec<ProviderRecord> {
        let state = self.state.read().await;
        state.providers.values().cloned().collect()
    }

    /// Get all payment records, in insertion order
    pub async fn get_all_payments(&self) -> Vec<PaymentRecord> {
        let state = self.state.read().await;
        state.payments.clone()
    }

    /// Get payment records still awaiting settlement, in insertion order
    pub async fn get_pending_payments(&self) -> Vec<PaymentRecord> {
        let state = self.state.read().await;
        state
            .payments
            .iter()
            .filter(|p| p.pending)
            .cloned()
            .collect()
    }

    /// Number of wallets in the pool
    pub async fn wallet_count(&self) -> usize {
        self.state.read().await.wallets.len()
    }

    // === Balance queries ===

    /// Sum of all tracked balances; 0 for an empty pool
    pub async fn total_balance(&self) -> u64 {
        let state = self.state.read().await;
        state.wallets.values().map(|w| w.balance).sum()
    }

    /// Largest tracked balance
    pub async fn max_balance(&self) -> Result<u64> {
        let state = self.state.read().await;
        state
            .max_wallet()
            .map(|w| w.balance)
            .ok_or(Error::NoWalletsAvailable)
    }

    /// Smallest tracked balance
    pub async fn min_balance(&self) -> Result<u64> {
        let state = self.state.read().await;
        state
            .min_wallet()
            .map(|w| w.balance)
            .ok_or(Error::NoWalletsAvailable)
    }

    /// Wallet holding the maximum balance; ties go to the lowest id
    pub async fn wallet_with_max_balance(&self) -> Result<WalletRecord> {
        let state = self.state.read().await;
        state.max_wallet().cloned().ok_or(Error::NoWalletsAvailable)
    }

    /// Wallet holding the minimum balance; ties go to the lowest id
    pub async fn wallet_with_min_balance(&self) -> Result<WalletRecord> {
        let state = self.state.read().await;
        state.min_wallet().cloned().ok_or(Error::NoWalletsAvailable)
    }

    /// Wallet holding the largest balance strictly below the maximum
    ///
    /// Fails with `NoWalletsAvailable` when no wallet sits below the
    /// maximum: empty pool, single wallet, or every wallet tied at the top.
    pub async fn wallet_with_second_largest_balance(&self) -> Result<WalletRecord> {
        let state = self.state.read().await;
        state
            .second_largest_wallet()
            .cloned()
            .ok_or(Error::NoWalletsAvailable)
    }

    /// Whether a single wallet can cover `amount_sats` right now
    pub async fn is_sendable(&self, amount_sats: u64) -> bool {
        let state = self.state.read().await;
        state.max_wallet().is_some_and(|w| w.balance >= amount_sats)
    }

    // === Payment recording ===

    /// Append a pending incoming leg for `wallet_id`
    ///
    /// The credit is applied to the wallet only when the leg settles.
    pub async fn record_pending_credit(
        &self,
        payment_hash: &str,
        wallet_id: u64,
        amount_sats: u64,
        payment_request: &str,
    ) -> Result<PaymentRecord> {
        let amount = signed_amount(amount_sats)?;

        let mut state = self.state.write().await;
        if !state.wallets.contains_key(&wallet_id) {
            return Err(Error::WalletNotFound(wallet_id));
        }

        let record = PaymentRecord {
            payment_hash: payment_hash.to_string(),
            amount,
            wallet_id,
            payment_request: payment_request.to_string(),
            pending: true,
            created_at: Utc::now(),
        };
        state.payments.push(record.clone());
        self.save(&state).await?;

        Ok(record)
    }

    /// Append a settled outgoing leg and debit its wallet, in one step
    ///
    /// Fails with `InsufficientWalletBalance` before recording anything if
    /// the wallet cannot cover the debit.
    pub async fn record_settled_debit(
        &self,
        payment_hash: &str,
        wallet_id: u64,
        amount_sats: u64,
        payment_request: &str,
    ) -> Result<PaymentRecord> {
        let amount = signed_amount(amount_sats)?;

        let mut state = self.state.write().await;
        let wallet = state
            .wallets
            .get_mut(&wallet_id)
            .ok_or(Error::WalletNotFound(wallet_id))?;

        wallet.balance = wallet.balance.checked_sub(amount_sats).ok_or(
            Error::InsufficientWalletBalance {
                wallet_id,
                requested: amount_sats,
                available: wallet.balance,
            },
        )?;

        let record = PaymentRecord {
            payment_hash: payment_hash.to_string(),
            amount: -amount,
            wallet_id,
            payment_request: payment_request.to_string(),
            pending: false,
            created_at: Utc::now(),
        };
        state.payments.push(record.clone());
        self.save(&state).await?;

        Ok(record)
    }

    /// Settle one pending leg: flip its flag and apply the signed credit to
    /// its wallet, atomically within one persisted snapshot
    ///
    /// Returns false when no matching pending leg exists (already settled),
    /// leaving everything untouched. Repeated calls are therefore idempotent.
    pub async fn settle_payment(&self, payment_hash: &str, wallet_id: u64) -> Result<bool> {
        let mut state = self.state.write().await;

        let amount = match state
            .payments
            .iter_mut()
            .find(|p| p.pending && p.payment_hash == payment_hash && p.wallet_id == wallet_id)
        {
            Some(record) => {
                record.pending = false;
                record.amount
            }
            None => return Ok(false),
        };

        let wallet = state
            .wallets
            .get_mut(&wallet_id)
            .ok_or(Error::WalletNotFound(wallet_id))?;
        wallet.balance = wallet.balance.saturating_add_signed(amount);

        self.save(&state).await?;
        Ok(true)
    }
}

/// Convert a satoshi amount to the signed record representation
fn signed_amount(amount_sats: u64) -> Result<i64> {
    i64::try_from(amount_sats).map_err(|_| {
        Error::InvalidAmount(format!("{} sats exceeds supported range", amount_sats))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store(balances: &[u64]) -> WalletStore {
        let store = WalletStore::new(None);
        store
            .add_provider(ProviderRecord {
                url: "http://one.example".to_string(),
                has_lost_funds: false,
                fees: None,
                name: None,
                description: None,
                website_url: None,
            })
            .await
            .unwrap();

        for (i, balance) in balances.iter().enumerate() {
            store
                .add_wallet(
                    "http://one.example",
                    &format!("admin{}", i),
                    &format!("invoice{}", i),
                    *balance,
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_add_wallet_assigns_monotonic_ids() {
        let store = seeded_store(&[10, 20]).await;

        let wallets = store.get_all_wallets().await;
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].id, 1);
        assert_eq!(wallets[1].id, 2);
    }

    #[tokio::test]
    async fn test_add_wallet_requires_known_provider() {
        let store = WalletStore::new(None);
        let result = store.add_wallet("http://nowhere.example", "a", "i", 0).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_add_provider_rejects_duplicates_and_bad_urls() {
        let store = seeded_store(&[]).await;

        let dup = store
            .add_provider(ProviderRecord {
                url: "http://one.example".to_string(),
                has_lost_funds: false,
                fees: None,
                name: None,
                description: None,
                website_url: None,
            })
            .await;
        assert!(matches!(dup, Err(Error::Config(_))));

        let bad = store
            .add_provider(ProviderRecord {
                url: "not a url".to_string(),
                has_lost_funds: false,
                fees: None,
                name: None,
                description: None,
                website_url: None,
            })
            .await;
        assert!(matches!(bad, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_balance_queries() {
        let store = seeded_store(&[10, 15, 5]).await;

        assert_eq!(store.total_balance().await, 30);
        assert_eq!(store.max_balance().await.unwrap(), 15);
        assert_eq!(store.min_balance().await.unwrap(), 5);
        assert_eq!(store.wallet_with_max_balance().await.unwrap().id, 2);
        assert_eq!(store.wallet_with_min_balance().await.unwrap().id, 3);
        assert_eq!(
            store.wallet_with_second_largest_balance().await.unwrap().id,
            1
        );
        assert!(store.is_sendable(15).await);
        assert!(!store.is_sendable(16).await);
    }

    #[tokio::test]
    async fn test_queries_on_empty_pool() {
        let store = WalletStore::new(None);

        assert_eq!(store.total_balance().await, 0);
        assert!(matches!(
            store.max_balance().await,
            Err(Error::NoWalletsAvailable)
        ));
        assert!(matches!(
            store.wallet_with_min_balance().await,
            Err(Error::NoWalletsAvailable)
        ));
        assert!(!store.is_sendable(1).await);
    }

    #[tokio::test]
    async fn test_max_balance_tie_breaks_by_lowest_id() {
        let store = seeded_store(&[10, 10, 5]).await;
        assert_eq!(store.wallet_with_max_balance().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_second_largest_excludes_all_wallets_at_max() {
        // Both wallets tied at the maximum: nothing sits below it
        let store = seeded_store(&[10, 10]).await;
        assert!(matches!(
            store.wallet_with_second_largest_balance().await,
            Err(Error::NoWalletsAvailable)
        ));

        // A single wallet has no second
        let single = seeded_store(&[10]).await;
        assert!(matches!(
            single.wallet_with_second_largest_balance().await,
            Err(Error::NoWalletsAvailable)
        ));
    }

    #[tokio::test]
    async fn test_settled_debit_checks_balance() {
        let store = seeded_store(&[10]).await;

        let result = store
            .record_settled_debit("hash", 1, 11, "lnbc110n1mock")
            .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientWalletBalance {
                wallet_id: 1,
                requested: 11,
                available: 10,
            })
        ));

        // Nothing was recorded and nothing was debited
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 10);
        assert!(store.get_all_payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_settle_payment_flips_flag_and_credits_once() {
        let store = seeded_store(&[0]).await;
        store
            .record_pending_credit("hash", 1, 25, "lnbc250n1mock")
            .await
            .unwrap();

        assert!(store.settle_payment("hash", 1).await.unwrap());
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 25);
        assert!(store.get_pending_payments().await.is_empty());

        // A second settle finds no pending leg and changes nothing
        assert!(!store.settle_payment("hash", 1).await.unwrap());
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 25);
    }

    #[tokio::test]
    async fn test_settle_payment_only_touches_matching_wallet_leg() {
        let store = seeded_store(&[50, 0]).await;

        // Transfer-shaped pair: pending credit on 2, settled debit on 1
        store
            .record_pending_credit("shared", 2, 20, "lnbc200n1mock")
            .await
            .unwrap();
        store
            .record_settled_debit("shared", 1, 20, "lnbc200n1mock")
            .await
            .unwrap();

        assert!(store.settle_payment("shared", 2).await.unwrap());
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 30);
        assert_eq!(store.get_wallet(2).await.unwrap().balance, 20);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("pool.json")
            .to_string_lossy()
            .into_owned();

        {
            let store = WalletStore::new(Some(path.clone()));
            store
                .add_provider(ProviderRecord {
                    url: "http://one.example".to_string(),
                    has_lost_funds: true,
                    fees: Some(0.5),
                    name: Some("one".to_string()),
                    description: None,
                    website_url: None,
                })
                .await
                .unwrap();
            store
                .add_wallet("http://one.example", "admin", "invoice", 40)
                .await
                .unwrap();
            store
                .record_pending_credit("hash", 1, 25, "lnbc250n1mock")
                .await
                .unwrap();
        }

        let reloaded = WalletStore::new(Some(path));
        reloaded.load().await.unwrap();

        assert_eq!(reloaded.wallet_count().await, 1);
        assert_eq!(reloaded.get_wallet(1).await.unwrap().balance, 40);
        assert_eq!(reloaded.get_all_providers().await.len(), 1);
        assert!(reloaded.get_all_providers().await[0].has_lost_funds);

        let pending = reloaded.get_pending_payments().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, 25);

        // Ids keep increasing after a reload
        let next = reloaded
            .add_wallet("http://one.example", "admin2", "invoice2", 0)
            .await
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_settling_a_negative_leg_saturates_at_zero() {
        // A pending debit can only enter via a hand-edited snapshot; settling
        // it must clamp instead of wrapping the balance
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        let snapshot = r#"{
            "providers": {},
            "wallets": {
                "1": {
                    "id": 1,
                    "provider_url": "http://one.example",
                    "balance": 10,
                    "admin_key": "admin",
                    "invoice_key": "invoice"
                }
            },
            "payments": [
                {
                    "payment_hash": "edited",
                    "amount": -50,
                    "wallet_id": 1,
                    "payment_request": "lnbc500n1mock",
                    "pending": true,
                    "created_at": "2026-08-24T00:00:00Z"
                }
            ],
            "next_wallet_id": 2
        }"#;
        std::fs::write(&path, snapshot).unwrap();

        let store = WalletStore::new(Some(path.to_string_lossy().into_owned()));
        store.load().await.unwrap();

        assert!(store.settle_payment("edited", 1).await.unwrap());
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("absent.json")
            .to_string_lossy()
            .into_owned();

        let store = WalletStore::new(Some(path));
        store.load().await.unwrap();
        assert_eq!(store.wallet_count().await, 0);
        assert_eq!(store.total_balance().await, 0);
    }
}
