//! Outgoing payment routing and invoice creation
//!
//! The router makes the pool look like one wallet. An outgoing payment is
//! dispatched from the wallet holding the most funds; when no single wallet
//! covers the amount, other wallets are drained into it (largest remaining
//! first, completely) until it does. Incoming invoices land on the wallet
//! holding the least, keeping balances spread below the cap.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::invoice;
use crate::pool::transfer::TransferEngine;
use crate::provider::{CreatedInvoice, WalletProvider};
use crate::store::WalletStore;

/// Routes external payments across the pool
pub struct PaymentRouter {
    store: Arc<WalletStore>,
    provider: Arc<dyn WalletProvider>,
    transfers: Arc<TransferEngine>,
}

impl PaymentRouter {
    /// Create a new router
    pub fn new(
        store: Arc<WalletStore>,
        provider: Arc<dyn WalletProvider>,
        transfers: Arc<TransferEngine>,
    ) -> Self {
        Self {
            store,
            provider,
            transfers,
        }
    }

    /// Pay an external BOLT11 payment request from the pool
    ///
    /// Consolidation drains the second-largest wallet fully into the largest
    /// until the largest covers the amount. Transfers already executed are
    /// not rolled back if a later step fails. Returns the payment hash.
    pub async fn pay(&self, payment_request: &str) -> Result<String> {
        let amount = invoice::amount_sats(payment_request)?;

        let total = self.store.total_balance().await;
        if amount > total {
            return Err(Error::InsufficientTotalFunds {
                requested: amount,
                available: total,
            });
        }

        let target = self.store.wallet_with_max_balance().await?;
        info!("Routing {} sat payment through wallet {}", amount, target.id);

        while amount > self.store.max_balance().await? {
            let donor = self.store.wallet_with_second_largest_balance().await?;
            if donor.balance == 0 {
                // Every other wallet is drained and the credits are still in
                // flight; no further transfer can make progress
                return Err(Error::InsufficientTotalFunds {
                    requested: amount,
                    available: self.store.total_balance().await,
                });
            }

            debug!(
                "Consolidating: draining wallet {} ({} sats) into wallet {}",
                donor.id, donor.balance, target.id
            );
            self.transfers
                .transfer(donor.id, target.id, donor.balance)
                .await?;
        }

        let payer = self.store.wallet_with_max_balance().await?;
        let payment_hash = self
            .provider
            .pay(&payer.provider_url, &payer.admin_key, payment_request)
            .await?;
        self.store
            .record_settled_debit(&payment_hash, payer.id, amount, payment_request)
            .await?;

        info!(
            "Paid {} sats from wallet {} ({})",
            amount, payer.id, payment_hash
        );
        Ok(payment_hash)
    }

    /// Create an invoice on the wallet best placed to receive
    ///
    /// The minimum-balance wallet is chosen so receipts fill the pool from
    /// the bottom. The credit stays pending until the payment settles.
    pub async fn create_invoice(&self, amount_sats: u64, memo: &str) -> Result<CreatedInvoice> {
        if amount_sats == 0 {
            return Err(Error::InvalidAmount(
                "invoice amount must be positive".to_string(),
            ));
        }

        let receiver = self.store.wallet_with_min_balance().await?;
        let invoice = self
            .provider
            .create_invoice(
                &receiver.provider_url,
                &receiver.invoice_key,
                amount_sats,
                memo,
            )
            .await?;
        self.store
            .record_pending_credit(
                &invoice.payment_hash,
                receiver.id,
                amount_sats,
                &invoice.payment_request,
            )
            .await?;

        info!(
            "Created {} sat invoice on wallet {} ({})",
            amount_sats, receiver.id, invoice.payment_hash
        );
        Ok(invoice)
    }
}
