//! Wallet provider integration
//!
//! A provider hosts one or more custodial wallets and exposes pay,
//! create-invoice and settlement-check operations over HTTP. The pool core
//! only talks to providers through the [`WalletProvider`] trait:
//! [`LnbitsClient`] is the production implementation, [`MockProvider`] backs
//! tests and dry runs.

use async_trait::async_trait;

use crate::error::Result;

pub mod lnbits;
pub mod mock;

// Re-exports
pub use lnbits::LnbitsClient;
pub use mock::MockProvider;

/// Invoice issued by a provider on behalf of one of its wallets
#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    /// Payment hash shared by both directions of the payment
    pub payment_hash: String,
    /// BOLT11 payment request text
    pub payment_request: String,
}

/// Operations a wallet's hosting provider must support
///
/// The base URL and API key are supplied per call so one client instance can
/// serve wallets hosted by different provider deployments. Every call is a
/// single attempt: a failure aborts the enclosing pool operation and is never
/// retried internally.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Pay a BOLT11 payment request from the wallet owning `admin_key`,
    /// returning the payment hash
    async fn pay(&self, base_url: &str, admin_key: &str, payment_request: &str)
        -> Result<String>;

    /// Create an invoice for `amount_sats` on the wallet owning `invoice_key`
    async fn create_invoice(
        &self,
        base_url: &str,
        invoice_key: &str,
        amount_sats: u64,
        memo: &str,
    ) -> Result<CreatedInvoice>;

    /// Check whether the payment behind `payment_hash` has settled
    async fn check_settled(
        &self,
        base_url: &str,
        invoice_key: &str,
        payment_hash: &str,
    ) -> Result<bool>;
}
