//! The wallet pool: one virtual balance over many custodial wallets
//!
//! `Pool` is the single entry point. It serializes the top-level operations
//! (pay, invoice, transfer, cap enforcement, reconciliation) behind one
//! mutex because they interleave balance reads and writes with no other
//! isolation; running two concurrently could double-spend a wallet.

pub mod cap;
pub mod reconcile;
pub mod router;
pub mod transfer;

pub use cap::CapEnforcer;
pub use reconcile::Reconciler;
pub use router::PaymentRouter;
pub use transfer::TransferEngine;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::PoolConfig;
use crate::error::Result;
use crate::provider::{CreatedInvoice, WalletProvider};
use crate::store::WalletStore;

/// Point-in-time summary of the pool
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub wallets: usize,
    pub total_balance: u64,
    pub pending_payments: usize,
}

/// Facade over the router, transfer engine, cap enforcer and reconciler
pub struct Pool {
    store: Arc<WalletStore>,
    router: PaymentRouter,
    transfers: Arc<TransferEngine>,
    cap: CapEnforcer,
    reconciler: Arc<Reconciler>,
    op_lock: Mutex<()>,
}

impl Pool {
    /// Wire up the pool components over a shared store and provider
    pub fn new(
        store: Arc<WalletStore>,
        provider: Arc<dyn WalletProvider>,
        config: &PoolConfig,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            provider.clone(),
            config.stale_pending_warn_secs,
        ));
        let transfers = Arc::new(TransferEngine::new(
            store.clone(),
            provider.clone(),
            reconciler.clone(),
            config.transfer_memo.clone(),
        ));
        let router = PaymentRouter::new(store.clone(), provider.clone(), transfers.clone());
        let cap = CapEnforcer::new(
            store.clone(),
            transfers.clone(),
            config.max_balance_per_wallet,
        );

        Self {
            store,
            router,
            transfers,
            cap,
            reconciler,
            op_lock: Mutex::new(()),
        }
    }

    /// Pay an external BOLT11 payment request from the pool's virtual balance
    pub async fn pay(&self, payment_request: &str) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        self.router.pay(payment_request).await
    }

    /// Create an invoice that tops up the pool's emptiest wallet
    pub async fn create_invoice(&self, amount_sats: u64, memo: &str) -> Result<CreatedInvoice> {
        let _guard = self.op_lock.lock().await;
        self.router.create_invoice(amount_sats, memo).await
    }

    /// Move funds between two pool members
    pub async fn transfer(
        &self,
        source_id: u64,
        destination_id: u64,
        amount_sats: u64,
    ) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        self.transfers
            .transfer(source_id, destination_id, amount_sats)
            .await
    }

    /// Rebalance one over-cap wallet, if any
    pub async fn enforce_cap(&self) -> Result<Option<String>> {
        let _guard = self.op_lock.lock().await;
        self.cap.enforce_after_receive().await
    }

    /// Poll every pending payment and credit the ones that settled
    pub async fn reconcile(&self) -> Result<usize> {
        let _guard = self.op_lock.lock().await;
        self.reconciler.reconcile_all_pending().await
    }

    /// Whether a single wallet can cover `amount_sats` without consolidation
    pub async fn is_sendable(&self, amount_sats: u64) -> bool {
        self.store.is_sendable(amount_sats).await
    }

    /// Snapshot of wallet count, total balance and pending payments
    pub async fn status(&self) -> PoolStatus {
        PoolStatus {
            wallets: self.store.wallet_count().await,
            total_balance: self.store.total_balance().await,
            pending_payments: self.store.get_pending_payments().await.len(),
        }
    }

    /// Direct access to the underlying store
    pub fn store(&self) -> &Arc<WalletStore> {
        &self.store
    }
}
