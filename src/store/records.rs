//! Durable record types for the wallet pool

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wallet provider known to the pool
///
/// Informational: the core algorithms only use the URL to identify which
/// backend hosts a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Base URL of the provider deployment, unique within the pool
    pub url: String,
    /// Whether this provider has ever lost funds
    #[serde(default)]
    pub has_lost_funds: bool,
    /// Advertised fee rate, if known
    #[serde(default)]
    pub fees: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
}

/// A custodial wallet participating in the pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Store-assigned id, unique and monotonically increasing
    pub id: u64,
    /// URL of the provider hosting this wallet
    pub provider_url: String,
    /// Tracked balance in satoshis
    ///
    /// The pool's cached view, not necessarily the provider's authoritative
    /// balance at every instant: debits land immediately, credits only once
    /// the corresponding payment settles.
    pub balance: u64,
    /// Key authorizing outgoing payments
    pub admin_key: String,
    /// Key authorizing invoice creation and settlement checks
    pub invoice_key: String,
}

/// One leg of a payment touching a pool wallet
///
/// An internal transfer produces two records sharing one payment hash: a
/// pending credit on the destination and a settled debit on the source.
/// `amount` and `wallet_id` never change after creation; only `pending`
/// transitions, and only from true to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Payment hash, shared by both legs of an internal transfer
    pub payment_hash: String,
    /// Signed amount in satoshis: negative outgoing, positive incoming
    pub amount: i64,
    /// Wallet this leg belongs to
    pub wallet_id: u64,
    /// BOLT11 payment request text
    pub payment_request: String,
    /// True until settlement is confirmed and the credit applied
    pub pending: bool,
    /// Creation time, used for stale-pending alerts
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Whether this leg credits its wallet
    pub fn is_incoming(&self) -> bool {
        self.amount > 0
    }

    /// Age of this record relative to `now`, in seconds
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }
}
