//! In-memory wallet provider for tests and dry runs
//!
//! Issues deterministic invoices, tracks settlement per payment hash, and
//! records every call so tests can assert on provider traffic. With
//! `auto_settle` an invoice settles the moment it is paid; otherwise
//! settlement is driven manually through [`MockProvider::settle`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::provider::{CreatedInvoice, WalletProvider};

#[derive(Debug, Default)]
struct MockState {
    auto_settle: bool,
    fail_next_pay: bool,
    fail_next_check: bool,
    counter: u64,
    /// payment_hash -> settled flag
    settlements: HashMap<String, bool>,
    /// payment_request -> payment_hash, for invoices this mock issued
    issued: HashMap<String, String>,
    pay_calls: Vec<String>,
    invoice_calls: Vec<u64>,
}

/// Mock [`WalletProvider`] backed by in-memory state
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    /// Create a mock whose invoices settle only via [`MockProvider::settle`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose invoices settle the moment they are paid
    pub fn auto_settling() -> Self {
        Self {
            state: Mutex::new(MockState {
                auto_settle: true,
                ..MockState::default()
            }),
        }
    }

    /// Make the next `pay` call fail with a provider error
    pub async fn fail_next_pay(&self) {
        self.state.lock().await.fail_next_pay = true;
    }

    /// Make the next `check_settled` call fail with a provider error
    pub async fn fail_next_check(&self) {
        self.state.lock().await.fail_next_check = true;
    }

    /// Mark a previously issued invoice as settled
    pub async fn settle(&self, payment_hash: &str) {
        let mut state = self.state.lock().await;
        if let Some(settled) = state.settlements.get_mut(payment_hash) {
            *settled = true;
        }
    }

    /// Mark every issued invoice as settled
    pub async fn settle_all(&self) {
        let mut state = self.state.lock().await;
        for settled in state.settlements.values_mut() {
            *settled = true;
        }
    }

    /// Payment requests passed to `pay`, in call order
    pub async fn pay_calls(&self) -> Vec<String> {
        self.state.lock().await.pay_calls.clone()
    }

    /// Amounts passed to `create_invoice`, in call order
    pub async fn invoice_calls(&self) -> Vec<u64> {
        self.state.lock().await.invoice_calls.clone()
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn pay(
        &self,
        _base_url: &str,
        _admin_key: &str,
        payment_request: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().await;

        if state.fail_next_pay {
            state.fail_next_pay = false;
            return Err(Error::ProviderRequestFailed {
                body: "injected pay failure".to_string(),
            });
        }

        state.pay_calls.push(payment_request.to_string());

        // Paying an invoice this mock issued settles it under auto_settle;
        // anything else counts as an external payment with a fresh hash.
        if let Some(payment_hash) = state.issued.get(payment_request).cloned() {
            if state.auto_settle {
                state.settlements.insert(payment_hash.clone(), true);
            }
            Ok(payment_hash)
        } else {
            state.counter += 1;
            Ok(format!("{:064x}", state.counter))
        }
    }

    async fn create_invoice(
        &self,
        _base_url: &str,
        _invoice_key: &str,
        amount_sats: u64,
        _memo: &str,
    ) -> Result<CreatedInvoice> {
        let mut state = self.state.lock().await;

        state.invoice_calls.push(amount_sats);
        state.counter += 1;

        let payment_hash = format!("{:064x}", state.counter);
        // Amount goes into the request so downstream decoding sees it:
        // N sats = N*10 nano-bitcoin units.
        let payment_request = format!("lnbc{}n1mock{:x}", amount_sats * 10, state.counter);

        state.settlements.insert(payment_hash.clone(), false);
        state
            .issued
            .insert(payment_request.clone(), payment_hash.clone());

        Ok(CreatedInvoice {
            payment_hash,
            payment_request,
        })
    }

    async fn check_settled(
        &self,
        _base_url: &str,
        _invoice_key: &str,
        payment_hash: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;

        if state.fail_next_check {
            state.fail_next_check = false;
            return Err(Error::ProviderRequestFailed {
                body: "injected status failure".to_string(),
            });
        }

        match state.settlements.get(payment_hash) {
            Some(settled) => Ok(*settled),
            None => Err(Error::ProviderRequestFailed {
                body: format!("unknown payment hash: {}", payment_hash),
            }),
        }
    }
}
