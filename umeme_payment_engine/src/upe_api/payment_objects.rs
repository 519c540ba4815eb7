use serde::{Deserialize, Serialize};
use upg_common::{Cents, WattHours};

use crate::{
    db_types::{PaymentRequest, Trade, TradeDirection},
    traits::ProviderStatusResult,
};

//--------------------------------------      TradeOrder      --------------------------------------------------------
/// A validated-enough trade intent, as it arrives from the routing layer. Amount and phone validation happen in the
/// engine, before any side effect.
#[derive(Debug, Clone)]
pub struct TradeOrder {
    pub direction: TradeDirection,
    pub energy: WattHours,
    /// Price of one kilowatt-hour, in cents.
    pub unit_price: Cents,
    pub buyer_phone: String,
    pub seller_phone: String,
    /// When false, provider failures surface as errors instead of falling back to the simulated provider.
    pub allow_simulated: bool,
}

//--------------------------------------     PaymentEvent     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Pushed to us by the provider's webhook.
    Callback,
    /// Fetched by the status poller.
    Poll,
    /// Synthesized by the mock provider.
    Simulated,
}

/// A provider's verdict on a payment request, normalised so that callbacks, poll results and simulated settlements
/// all flow through the same reconciliation logic.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: String,
    /// 0 is success; anything else is an explicit decline or failure.
    pub result_code: i64,
    pub result_desc: String,
    /// The settled amount, when the provider reports one. Checked against the requested amount with zero tolerance.
    pub amount: Option<Cents>,
    pub receipt_number: Option<String>,
    pub phone: Option<String>,
    pub source: EventSource,
}

impl PaymentEvent {
    pub fn from_provider_status(checkout_request_id: &str, status: ProviderStatusResult, source: EventSource) -> Self {
        Self {
            merchant_request_id: None,
            checkout_request_id: checkout_request_id.to_string(),
            result_code: status.result_code,
            result_desc: status.result_desc,
            amount: status.amount,
            receipt_number: status.receipt_number,
            phone: None,
            source,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

//--------------------------------------   ReconcileOutcome   --------------------------------------------------------
/// What became of a [`PaymentEvent`]. Only `Confirmed` and `Failed` represent fresh state transitions; everything
/// else is the idempotency/robustness machinery doing its job.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The payment settled; the request is `Confirmed` and the trade `Paid`.
    Confirmed(PaymentRequest),
    /// The provider declined, or the amount did not match; the request (and trade) are `Failed`.
    Failed(PaymentRequest),
    /// The event repeats a verdict we already hold. No-op.
    Duplicate(PaymentRequest),
    /// Another event for the same correlation id is being reconciled right now. No-op; the winner finalises.
    AlreadyInFlight,
    /// No payment request matches the correlation id, even after the grace window. Logged and discarded.
    Orphaned,
    /// The event contradicts a stored terminal outcome. The stored outcome remains authoritative.
    Conflict(PaymentRequest),
}

//--------------------------------------     TradeOutcome     --------------------------------------------------------
/// The result of executing (or retrying) a trade: the trade, the active payment attempt, and whether settlement is
/// running against the simulated provider.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub trade: Trade,
    pub payment_request: PaymentRequest,
    pub customer_message: Option<String>,
}

impl TradeOutcome {
    pub fn is_simulated(&self) -> bool {
        self.trade.simulated
    }
}
