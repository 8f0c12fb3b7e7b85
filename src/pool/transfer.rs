//! Inter-wallet fund movement
//!
//! A transfer between two pool wallets is a real Lightning payment: the
//! destination issues an invoice, the source pays it. The source is debited
//! immediately; the destination is credited only once the reconciler sees the
//! payment settle. In between, the pool's tracked total is understated by the
//! amount in flight.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pool::reconcile::Reconciler;
use crate::provider::WalletProvider;
use crate::store::WalletStore;

/// Executes transfers between pool wallets
pub struct TransferEngine {
    store: Arc<WalletStore>,
    provider: Arc<dyn WalletProvider>,
    reconciler: Arc<Reconciler>,
    memo: String,
}

impl TransferEngine {
    /// Create a new transfer engine
    pub fn new(
        store: Arc<WalletStore>,
        provider: Arc<dyn WalletProvider>,
        reconciler: Arc<Reconciler>,
        memo: String,
    ) -> Self {
        Self {
            store,
            provider,
            reconciler,
            memo,
        }
    }

    /// Move `amount_sats` from one pool wallet to another
    ///
    /// Records two payment legs sharing one hash: a pending credit on the
    /// destination and a settled debit on the source. Ends with a
    /// reconciliation pass so already-settled legs are applied without
    /// waiting for the next scheduled one.
    ///
    /// If the pay step fails after the invoice was issued, the source is not
    /// debited and the destination keeps a pending leg that will never
    /// settle; the stale-pending warning surfaces it to the operator.
    pub async fn transfer(
        &self,
        source_id: u64,
        destination_id: u64,
        amount_sats: u64,
    ) -> Result<String> {
        if amount_sats == 0 {
            return Err(Error::InvalidAmount(
                "transfer amount must be positive".to_string(),
            ));
        }

        let source = self.store.get_wallet(source_id).await?;
        let destination = self.store.get_wallet(destination_id).await?;

        if amount_sats > source.balance {
            return Err(Error::InsufficientWalletBalance {
                wallet_id: source_id,
                requested: amount_sats,
                available: source.balance,
            });
        }

        debug!(
            "Transferring {} sats from wallet {} to wallet {}",
            amount_sats, source_id, destination_id
        );

        let invoice = self
            .provider
            .create_invoice(
                &destination.provider_url,
                &destination.invoice_key,
                amount_sats,
                &self.memo,
            )
            .await?;
        self.store
            .record_pending_credit(
                &invoice.payment_hash,
                destination_id,
                amount_sats,
                &invoice.payment_request,
            )
            .await?;

        self.provider
            .pay(
                &source.provider_url,
                &source.admin_key,
                &invoice.payment_request,
            )
            .await?;
        self.store
            .record_settled_debit(
                &invoice.payment_hash,
                source_id,
                amount_sats,
                &invoice.payment_request,
            )
            .await?;

        info!(
            "Transfer of {} sats from wallet {} to wallet {} dispatched ({})",
            amount_sats, source_id, destination_id, invoice.payment_hash
        );

        self.reconciler.reconcile_all_pending().await?;

        Ok(invoice.payment_hash)
    }
}
