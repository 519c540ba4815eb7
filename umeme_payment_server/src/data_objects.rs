use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use umeme_payment_engine::{
    db_types::{PaymentRequest, PaymentStatus, TradeDirection, TradeStatus},
    payment_objects::{TradeOrder, TradeOutcome},
};
use upg_common::{Cents, WattHours};

use crate::errors::ServerError;

//--------------------------------------     TradeRequest     --------------------------------------------------------
/// The body of `POST /api/execute_trade`.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub direction: TradeDirection,
    /// Energy volume in kilowatt-hours, e.g. 2.5.
    pub energy_kwh: f64,
    /// Price per kilowatt-hour in shillings, e.g. 12.50.
    pub unit_price: f64,
    pub buyer_phone: String,
    pub seller_phone: String,
    /// Whether the caller accepts settlement through the simulated provider if the real one is unavailable.
    #[serde(default = "default_true")]
    pub allow_simulated: bool,
}

fn default_true() -> bool {
    true
}

impl TradeRequest {
    pub fn into_order(self) -> Result<TradeOrder, ServerError> {
        let energy = WattHours::try_from_kwh_f64(self.energy_kwh)
            .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        let unit_price =
            Cents::try_from(self.unit_price).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        Ok(TradeOrder {
            direction: self.direction,
            energy,
            unit_price,
            buyer_phone: self.buyer_phone,
            seller_phone: self.seller_phone,
            allow_simulated: self.allow_simulated,
        })
    }
}

//--------------------------------------     TradeResponse    --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct TradeResponse {
    pub trade_id: String,
    pub payment_request_id: i64,
    pub attempt: i64,
    pub status: TradeStatus,
    /// The exact trade total.
    pub total: Cents,
    /// The whole-shilling amount the payer is being prompted for.
    pub amount: Cents,
    pub simulated: bool,
    pub customer_message: Option<String>,
}

impl From<TradeOutcome> for TradeResponse {
    fn from(outcome: TradeOutcome) -> Self {
        Self {
            trade_id: outcome.trade.trade_id.to_string(),
            payment_request_id: outcome.payment_request.id,
            attempt: outcome.payment_request.attempt,
            status: outcome.trade.status,
            total: outcome.trade.total,
            amount: outcome.payment_request.amount,
            simulated: outcome.trade.simulated,
            customer_message: outcome.customer_message,
        }
    }
}

//--------------------------------------    StatusResponse    --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub payment_request_id: i64,
    pub trade_id: String,
    pub attempt: i64,
    pub status: PaymentStatus,
    pub amount: Cents,
    pub receipt_number: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRequest> for StatusResponse {
    fn from(request: PaymentRequest) -> Self {
        Self {
            payment_request_id: request.id,
            trade_id: request.trade_id.to_string(),
            attempt: request.attempt,
            status: request.status,
            amount: request.amount,
            receipt_number: request.receipt_number,
            result_code: request.result_code,
            result_desc: request.result_desc,
            updated_at: request.updated_at,
        }
    }
}

//--------------------------------------     CallbackAck      --------------------------------------------------------
/// Daraja retries callbacks that do not get a 200 with this shape, so every callback is acknowledged, no matter what
/// we thought of its contents.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self { result_code: 0, result_desc: "Accepted".to_string() }
    }
}
