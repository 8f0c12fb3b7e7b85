//! Per-wallet balance cap enforcement
//!
//! Custodial wallets concentrate risk, so no single pool member is allowed
//! to hold more than a configured cap. After any operation that can raise a
//! balance, the enforcer moves the surplus of the largest wallet into the
//! smallest. Exactly one transfer is performed per call; repeated invocation
//! (the run loop) converges the rest.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pool::transfer::TransferEngine;
use crate::store::WalletStore;

/// Moves surplus out of over-cap wallets
pub struct CapEnforcer {
    store: Arc<WalletStore>,
    transfers: Arc<TransferEngine>,
    cap: u64,
}

impl CapEnforcer {
    /// Create a new enforcer with the given per-wallet cap in sats
    pub fn new(store: Arc<WalletStore>, transfers: Arc<TransferEngine>, cap: u64) -> Self {
        Self {
            store,
            transfers,
            cap,
        }
    }

    /// Rebalance once if any wallet exceeds the cap
    ///
    /// Returns the transfer's payment hash when a rebalance ran, `None` when
    /// every wallet already sits at or under the cap. Fails with
    /// `CapPolicyViolation` when even the smallest wallet is over cap: the
    /// pool cannot absorb the surplus and an operator must add a wallet or
    /// raise the cap.
    pub async fn enforce_after_receive(&self) -> Result<Option<String>> {
        if self.store.wallet_count().await == 0 {
            return Ok(None);
        }

        let min = self.store.wallet_with_min_balance().await?;
        if min.balance > self.cap {
            warn!(
                "Every wallet is over the {} sat cap (smallest holds {})",
                self.cap, min.balance
            );
            return Err(Error::CapPolicyViolation {
                cap: self.cap,
                min_balance: min.balance,
            });
        }

        let max = self.store.wallet_with_max_balance().await?;
        if max.balance <= self.cap {
            return Ok(None);
        }

        let surplus = max.balance - self.cap;
        info!(
            "Wallet {} is {} sats over cap, rebalancing into wallet {}",
            max.id, surplus, min.id
        );
        let payment_hash = self.transfers.transfer(max.id, min.id, surplus).await?;
        Ok(Some(payment_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::reconcile::Reconciler;
    use crate::provider::MockProvider;
    use crate::store::ProviderRecord;

    async fn seeded_store(balances: &[u64]) -> Arc<WalletStore> {
        let store = Arc::new(WalletStore::new(None));
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

    fn enforcer(
        store: &Arc<WalletStore>,
        provider: &Arc<MockProvider>,
        cap: u64,
    ) -> CapEnforcer {
        let reconciler = Arc::new(Reconciler::new(store.clone(), provider.clone(), 3600));
        let transfers = Arc::new(TransferEngine::new(
            store.clone(),
            provider.clone(),
            reconciler,
            "pool rebalance".to_string(),
        ));
        CapEnforcer::new(store.clone(), transfers, cap)
    }

    #[tokio::test]
    async fn test_surplus_moves_from_largest_to_smallest() {
        let store = seeded_store(&[30, 0]).await;
        let provider = Arc::new(MockProvider::auto_settling());
        let enforcer = enforcer(&store, &provider, 22);

        let hash = enforcer.enforce_after_receive().await.unwrap();
        assert!(hash.is_some());

        assert_eq!(store.get_wallet(1).await.unwrap().balance, 22);
        assert_eq!(store.get_wallet(2).await.unwrap().balance, 8);
        assert_eq!(provider.invoice_calls().await, vec![8]);
    }

    #[tokio::test]
    async fn test_all_wallets_over_cap_is_a_policy_violation() {
        let store = seeded_store(&[25, 23]).await;
        let provider = Arc::new(MockProvider::auto_settling());
        let enforcer = enforcer(&store, &provider, 22);

        let result = enforcer.enforce_after_receive().await;
        assert!(matches!(
            result,
            Err(Error::CapPolicyViolation {
                cap: 22,
                min_balance: 23,
            })
        ));

        assert_eq!(store.get_wallet(1).await.unwrap().balance, 25);
        assert_eq!(store.get_wallet(2).await.unwrap().balance, 23);
        assert!(provider.pay_calls().await.is_empty());
        assert!(provider.invoice_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_transfer_per_call_converges_over_repeated_calls() {
        let store = seeded_store(&[50, 0, 0]).await;
        let provider = Arc::new(MockProvider::auto_settling());
        let enforcer = enforcer(&store, &provider, 22);

        assert!(enforcer.enforce_after_receive().await.unwrap().is_some());
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 22);
        assert_eq!(store.get_wallet(2).await.unwrap().balance, 28);

        assert!(enforcer.enforce_after_receive().await.unwrap().is_some());
        assert_eq!(store.get_wallet(2).await.unwrap().balance, 22);
        assert_eq!(store.get_wallet(3).await.unwrap().balance, 6);

        assert!(enforcer.enforce_after_receive().await.unwrap().is_none());
        assert_eq!(store.total_balance().await, 50);
    }

    #[tokio::test]
    async fn test_balances_at_the_cap_are_left_alone() {
        let store = seeded_store(&[22, 22]).await;
        let provider = Arc::new(MockProvider::auto_settling());
        let enforcer = enforcer(&store, &provider, 22);

        assert!(enforcer.enforce_after_receive().await.unwrap().is_none());
        assert!(provider.pay_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_has_nothing_to_enforce() {
        let store = seeded_store(&[]).await;
        let provider = Arc::new(MockProvider::new());
        let enforcer = enforcer(&store, &provider, 22);

        assert!(enforcer.enforce_after_receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_the_rebalance() {
        let store = seeded_store(&[30, 0]).await;
        let provider = Arc::new(MockProvider::auto_settling());
        provider.fail_next_pay().await;
        let enforcer = enforcer(&store, &provider, 22);

        let result = enforcer.enforce_after_receive().await;
        assert!(matches!(result, Err(Error::ProviderRequestFailed { .. })));

        // Source untouched, destination credit dangling as pending
        assert_eq!(store.get_wallet(1).await.unwrap().balance, 30);
        assert_eq!(store.get_pending_payments().await.len(), 1);
    }
}
