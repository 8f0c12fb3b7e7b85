//! Error types for the wallet pool

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet pool
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Routing errors
    #[error("Insufficient total funds: {requested} sats requested, {available} sats across pool")]
    InsufficientTotalFunds { requested: u64, available: u64 },

    #[error("Insufficient wallet balance: wallet {wallet_id} holds {available} sats, {requested} sats requested")]
    InsufficientWalletBalance {
        wallet_id: u64,
        requested: u64,
        available: u64,
    },

    #[error("No wallets available in pool")]
    NoWalletsAvailable,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Lookup errors
    #[error("Wallet not found: {0}")]
    WalletNotFound(u64),

    // Cap policy errors
    #[error("Cap policy violation: every wallet exceeds the {cap} sat cap (smallest holds {min_balance})")]
    CapPolicyViolation { cap: u64, min_balance: u64 },

    // Provider errors
    #[error("Provider request failed: {body}")]
    ProviderRequestFailed { body: String },

    // Store errors
    #[error("Store persistence failed: {0}")]
    StorePersistence(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is transient (a later attempt may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderRequestFailed { .. } | Error::StorePersistence(_)
        )
    }

    /// Check if this error requires operator attention
    pub fn is_operator_alert(&self) -> bool {
        matches!(
            self,
            Error::CapPolicyViolation { .. } | Error::ProviderRequestFailed { .. }
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ProviderRequestFailed {
            body: e.to_string(),
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StorePersistence(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorePersistence(e.to_string())
    }
}
