//! lnpool Library
//!
//! One spendable Lightning balance over many custodial LNbits wallets.

pub mod cli;
pub mod config;
pub mod error;
pub mod invoice;
pub mod pool;
pub mod provider;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use pool::Pool;
