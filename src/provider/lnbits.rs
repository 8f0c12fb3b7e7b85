//! LNbits payments API client
//!
//! Speaks the LNbits REST API: POST /api/v1/payments to pay or create an
//! invoice (keyed by the wallet's admin or invoice key via the X-Api-Key
//! header), GET /api/v1/payments/{hash} to check settlement.
//!
//! Requests are single attempts with a plain timeout. A hung or failing
//! provider surfaces as one ProviderRequestFailed carrying the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::{CreatedInvoice, WalletProvider};

/// Per-wallet API key header
const API_KEY_HEADER: &str = "X-Api-Key";

/// Payment dispatch request body
#[derive(Debug, Clone, Serialize)]
pub struct PayRequest {
    /// Always true: funds leave the wallet
    pub out: bool,
    /// BOLT11 payment request to pay
    pub bolt11: String,
}

/// Invoice creation request body
#[derive(Debug, Clone, Serialize)]
pub struct CreateInvoiceRequest {
    /// Always false: funds enter the wallet
    pub out: bool,
    /// Invoice amount in satoshis
    pub amount: u64,
    /// Memo shown to the payer
    pub memo: String,
}

/// Response to a payment dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct PayResponse {
    pub payment_hash: String,
}

/// Response to an invoice creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceResponse {
    pub payment_hash: String,
    pub payment_request: String,
}

/// Settlement status of a single payment
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatus {
    pub paid: bool,
}

/// LNbits payments API client
///
/// One client serves every wallet in the pool; wallets hosted by different
/// LNbits deployments share the same connection pool.
pub struct LnbitsClient {
    client: Client,
}

impl LnbitsClient {
    /// Create a new client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn payments_url(base_url: &str) -> String {
        format!("{}/api/v1/payments", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WalletProvider for LnbitsClient {
    async fn pay(
        &self,
        base_url: &str,
        admin_key: &str,
        payment_request: &str,
    ) -> Result<String> {
        debug!("Paying invoice via {}", base_url);

        let body = PayRequest {
            out: true,
            bolt11: payment_request.to_string(),
        };

        let response = self
            .client
            .post(Self::payments_url(base_url))
            .header(API_KEY_HEADER, admin_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderRequestFailed {
                body: format!("pay returned {}: {}", status, body),
            });
        }

        let parsed: PayResponse =
            response
                .json()
                .await
                .map_err(|e| Error::ProviderRequestFailed {
                    body: format!("pay response malformed: {}", e),
                })?;

        Ok(parsed.payment_hash)
    }

    async fn create_invoice(
        &self,
        base_url: &str,
        invoice_key: &str,
        amount_sats: u64,
        memo: &str,
    ) -> Result<CreatedInvoice> {
        debug!("Creating {} sat invoice via {}", amount_sats, base_url);

        let body = CreateInvoiceRequest {
            out: false,
            amount: amount_sats,
            memo: memo.to_string(),
        };

        let response = self
            .client
            .post(Self::payments_url(base_url))
            .header(API_KEY_HEADER, invoice_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderRequestFailed {
                body: format!("create invoice returned {}: {}", status, body),
            });
        }

        let parsed: CreateInvoiceResponse =
            response
                .json()
                .await
                .map_err(|e| Error::ProviderRequestFailed {
                    body: format!("create invoice response malformed: {}", e),
                })?;

        Ok(CreatedInvoice {
            payment_hash: parsed.payment_hash,
            payment_request: parsed.payment_request,
        })
    }

    async fn check_settled(
        &self,
        base_url: &str,
        invoice_key: &str,
        payment_hash: &str,
    ) -> Result<bool> {
        let url = format!("{}/{}", Self::payments_url(base_url), payment_hash);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, invoice_key)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderRequestFailed {
                body: format!("payment status returned {}: {}", status, body),
            });
        }

        let parsed: PaymentStatus =
            response
                .json()
                .await
                .map_err(|e| Error::ProviderRequestFailed {
                    body: format!("payment status response malformed: {}", e),
                })?;

        Ok(parsed.paid)
    }
}
