use async_trait::async_trait;
use thiserror::Error;
use upg_common::Cents;

use crate::{db_types::TradeId, helpers::PhoneNumber};

/// Everything a provider needs to prompt the payer's handset for authorisation.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub trade_id: TradeId,
    pub phone: PhoneNumber,
    /// Whole-shilling amount (already rounded), in cents.
    pub amount: Cents,
    /// Account reference shown to the payer, derived from the trade id.
    pub reference: String,
    pub description: String,
}

/// The provider correlation pair returned by a successful initiate call. Everything that happens to the payment
/// afterwards (callbacks, status queries) is keyed by the checkout request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushInit {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: Option<String>,
}

/// The outcome of a status query for a settled (or declined) payment.
#[derive(Debug, Clone)]
pub struct ProviderStatusResult {
    /// 0 means the payment went through. Anything else is an explicit decline or failure.
    pub result_code: i64,
    pub result_desc: String,
    pub receipt_number: Option<String>,
    /// The settled amount, when the provider reports one.
    pub amount: Option<Cents>,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentProviderError {
    /// The provider could not be reached or answered with a transport-level failure. Retryable; triggers fallback.
    #[error("The payment provider is unavailable: {0}")]
    Unavailable(String),
    /// Credentials were rejected or a token could not be obtained. Triggers fallback.
    #[error("Could not authenticate with the payment provider: {0}")]
    Auth(String),
    /// The provider rejected the request itself (bad shortcode, malformed payload, ...). Not retryable as-is.
    #[error("The payment provider rejected the request. Code {code}. {message}")]
    Rejected { code: String, message: String },
    /// Our own request was invalid before it ever left the process.
    #[error("Invalid payment request: {0}")]
    Validation(String),
}

/// The capability surface common to the real and the simulated payment gateway.
///
/// Exactly one provider is wired per orchestrator instance; the choice between real and mock is configuration, never
/// an ad-hoc branch per call.
#[async_trait]
pub trait PaymentProvider: Clone + Send + Sync {
    /// Requests a push payment. On success the provider starts working asynchronously and the eventual outcome
    /// arrives as a callback (or is fetched by polling), keyed by the returned correlation pair.
    async fn initiate(&self, request: PushRequest) -> Result<PushInit, PaymentProviderError>;

    /// Queries the outcome of an earlier push. `Ok(None)` means the payer has not responded yet.
    async fn query_status(&self, checkout_request_id: &str)
        -> Result<Option<ProviderStatusResult>, PaymentProviderError>;
}
