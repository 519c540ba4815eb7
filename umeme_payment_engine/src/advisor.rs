//! Advisory hooks for trade decision support.
//!
//! The orchestrator never blocks a trade on advice; an advisor is a read-only oracle that consumers (dashboards,
//! auto-traders) may consult before calling [`TradeFlowApi::execute_trade`](crate::TradeFlowApi::execute_trade).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use upg_common::{Cents, WattHours};

use crate::traits::PaymentGatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisedAction {
    Buy,
    Sell,
    Hold,
}

/// A confidence score, always in `[0, 1]`. Out-of-range inputs are clamped rather than rejected, so a sloppy model
/// can never poison the advice pipeline.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAdvice {
    pub action: AdvisedAction,
    pub confidence: Confidence,
    /// Suggested energy volume for the advised action, when the advisor has one.
    pub energy: Option<WattHours>,
    /// Suggested unit price per kWh, when the advisor has one.
    pub unit_price: Option<Cents>,
    pub rationale: String,
}

#[async_trait]
pub trait TradeAdvisor: Send + Sync {
    /// Advice for the given account, based on whatever signals the implementation tracks (price history, weather,
    /// battery state). Must be side-effect free.
    async fn advise(&self, phone: &str) -> Result<TradeAdvice, PaymentGatewayError>;
}
