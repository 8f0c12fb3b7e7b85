//! Pending payment reconciliation
//!
//! The reconciler is the only component that turns a pending credit into a
//! realized balance increase. It polls every payment still marked pending
//! against the owning wallet's provider and, on confirmed settlement, flips
//! the flag and applies the credit in one atomic store update.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::provider::WalletProvider;
use crate::store::WalletStore;

/// Polls pending payments and applies confirmed settlements
pub struct Reconciler {
    store: Arc<WalletStore>,
    provider: Arc<dyn WalletProvider>,
    stale_warn_secs: i64,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        store: Arc<WalletStore>,
        provider: Arc<dyn WalletProvider>,
        stale_warn_secs: i64,
    ) -> Self {
        Self {
            store,
            provider,
            stale_warn_secs,
        }
    }

    /// Check every pending payment once, applying confirmed settlements
    ///
    /// Returns the number of payments settled in this pass. A provider error
    /// aborts the pass immediately and propagates; settlements already
    /// applied stay applied. Running the pass again with no new settlements
    /// changes nothing.
    pub async fn reconcile_all_pending(&self) -> Result<usize> {
        let pending = self.store.get_pending_payments().await;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!("Reconciling {} pending payments", pending.len());

        let now = Utc::now();
        let mut settled = 0usize;

        for payment in pending {
            let wallet = self.store.get_wallet(payment.wallet_id).await?;

            let paid = self
                .provider
                .check_settled(
                    &wallet.provider_url,
                    &wallet.invoice_key,
                    &payment.payment_hash,
                )
                .await?;

            if paid {
                if self
                    .store
                    .settle_payment(&payment.payment_hash, payment.wallet_id)
                    .await?
                {
                    info!(
                        "Settled payment {} for wallet {} ({} sats)",
                        payment.payment_hash, payment.wallet_id, payment.amount
                    );
                    settled += 1;
                }
            } else {
                let age = payment.age_secs(now);
                if age > self.stale_warn_secs {
                    warn!(
                        "Payment {} for wallet {} still pending after {}s",
                        payment.payment_hash, payment.wallet_id, age
                    );
                }
            }
        }

        Ok(settled)
    }
}
