use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use upg_common::{Cents, WattHours};

use crate::helpers::PhoneNumber;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------       TradeId        --------------------------------------------------------
/// The public identifier of a trade, e.g. `TRD-4F7K2M9QAZ`. Assigned fresh for every trade, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TradeId(pub String);

impl FromStr for TradeId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TradeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TradeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    TradeDirection    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TradeDirection {
    /// The household is buying energy to cover a deficit.
    Buy,
    /// The household is selling surplus energy to a neighbour.
    Sell,
}

impl Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "Buy"),
            TradeDirection::Sell => write!(f, "Sell"),
        }
    }
}

impl FromStr for TradeDirection {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" | "BUY" | "buy" => Ok(Self::Buy),
            "Sell" | "SELL" | "sell" => Ok(Self::Sell),
            s => Err(ConversionError(format!("Invalid trade direction: {s}"))),
        }
    }
}

//--------------------------------------     TradeStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TradeStatus {
    /// The trade exists and settlement is in progress (or awaiting a retry).
    Pending,
    /// Settlement confirmed. Terminal.
    Paid,
    /// Settlement explicitly failed. Terminal.
    Failed,
    /// Cancelled before the payer authorised anything. Terminal.
    Cancelled,
}

impl TradeStatus {
    /// Status transitions are monotonic: once a trade leaves `Pending` it never moves again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }
}

impl Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "Pending"),
            TradeStatus::Paid => write!(f, "Paid"),
            TradeStatus::Failed => write!(f, "Failed"),
            TradeStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for TradeStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid trade status: {s}"))),
        }
    }
}

impl From<String> for TradeStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid trade status: {value}. But this conversion cannot fail. Defaulting to Pending");
            TradeStatus::Pending
        })
    }
}

//--------------------------------------    PaymentStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The push request has been (or is being) sent to the provider. Awaiting a callback.
    Initiated,
    /// A callback or poll result has been claimed for this request and is being reconciled. Transitions for a given
    /// correlation id serialise on this claim.
    CallbackReceived,
    /// The provider confirmed the payment. Terminal; `receipt_number` is set.
    Confirmed,
    /// The provider declined the payment, or reconciliation failed it (e.g. amount mismatch). Terminal.
    Failed,
    /// No answer within the timeout window. Terminal, but distinct from `Failed`: "no answer" rather than "declined".
    /// A new attempt may be created for the same trade.
    Timeout,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Failed | PaymentStatus::Timeout)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Initiated => write!(f, "Initiated"),
            PaymentStatus::CallbackReceived => write!(f, "CallbackReceived"),
            PaymentStatus::Confirmed => write!(f, "Confirmed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Timeout => write!(f, "Timeout"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "CallbackReceived" => Ok(Self::CallbackReceived),
            "Confirmed" => Ok(Self::Confirmed),
            "Failed" => Ok(Self::Failed),
            "Timeout" => Ok(Self::Timeout),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------        Trade         --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Trade {
    pub id: i64,
    pub trade_id: TradeId,
    pub direction: TradeDirection,
    #[sqlx(rename = "energy_wh")]
    pub energy: WattHours,
    /// Price of one kilowatt-hour, in cents.
    pub unit_price: Cents,
    /// The exact settlement total, `energy × unit_price`, in cents.
    pub total: Cents,
    pub buyer_phone: PhoneNumber,
    pub seller_phone: PhoneNumber,
    pub status: TradeStatus,
    /// True when settlement ran (or is running) against the simulated provider rather than the real one. Recorded so
    /// that a simulated outcome is never mistaken for a real payment.
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewTrade       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub trade_id: TradeId,
    pub direction: TradeDirection,
    pub energy: WattHours,
    pub unit_price: Cents,
    pub total: Cents,
    pub buyer_phone: PhoneNumber,
    pub seller_phone: PhoneNumber,
}

//--------------------------------------    PaymentRequest    --------------------------------------------------------
/// One attempt to collect payment for a trade.
///
/// At most one non-terminal request exists per trade at any time; a fresh attempt may only be created once the
/// previous one has reached a terminal status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRequest {
    pub id: i64,
    pub trade_id: TradeId,
    pub attempt: i64,
    /// Provider correlation pair, assigned when the initiate call succeeds.
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub phone: PhoneNumber,
    /// The amount the provider was asked to collect. For the real provider this is the trade total rounded up to a
    /// whole shilling; callbacks must match it exactly.
    pub amount: Cents,
    pub status: PaymentStatus,
    pub receipt_number: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
