//! `TradeFlowApi` drives the life of a trade: validate, persist, push the payment, and (where allowed) fall back to
//! the simulated provider when the real one is down.

use log::*;
use upg_common::Cents;

use crate::{
    db_types::{NewTrade, PaymentRequest, Trade, TradeId},
    health::ProviderHealth,
    helpers::{new_trade_id, normalize_phone},
    mock::MockProvider,
    traits::{PaymentGatewayDatabase, PaymentGatewayError, PaymentProvider, PaymentProviderError, PushInit, PushRequest},
    upe_api::payment_objects::{TradeOrder, TradeOutcome},
};

pub struct TradeFlowApi<B, P> {
    db: B,
    provider: Option<P>,
    mock: MockProvider<B>,
    health: ProviderHealth,
    allow_mock_fallback: bool,
}

impl<B, P> TradeFlowApi<B, P>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider,
{
    /// `provider` is `None` when no real gateway is configured; every trade then settles through the mock, subject to
    /// the same `allow_simulated` consent check as a fallback would be.
    pub fn new(db: B, provider: Option<P>, mock: MockProvider<B>, health: ProviderHealth, allow_mock_fallback: bool) -> Self {
        Self { db, provider, mock, health, allow_mock_fallback }
    }

    /// Validates and persists a trade, then asks the payment provider to prompt the buyer's handset. Returns as soon
    /// as the push is in flight; confirmation arrives later via callback or polling.
    pub async fn execute_trade(&self, order: TradeOrder) -> Result<TradeOutcome, PaymentGatewayError> {
        let (trade, request) = self.store_new_trade(&order).await?;
        info!(
            "💻️ Trade {} stored: {} {} at {}/kWh, total {} (collecting {})",
            trade.trade_id, trade.direction, trade.energy, trade.unit_price, trade.total, request.amount
        );
        self.push_payment(trade, request, order.allow_simulated).await
    }

    /// Cancels a trade. Only possible while the payer has not been prompted past the point of no return, i.e. the
    /// active payment request is still `Initiated`.
    pub async fn cancel_trade(&self, trade_id: &TradeId) -> Result<(Trade, PaymentRequest), PaymentGatewayError> {
        let (trade, request) = self.db.cancel_trade(trade_id).await?;
        info!("💻️ Trade {} cancelled by the user", trade.trade_id);
        Ok((trade, request))
    }

    /// Starts a fresh payment attempt for a `Pending` trade whose previous attempt timed out or failed.
    pub async fn retry_payment(&self, trade_id: &TradeId, allow_simulated: bool) -> Result<TradeOutcome, PaymentGatewayError> {
        let trade = self.db.fetch_trade(trade_id).await?.ok_or_else(|| PaymentGatewayError::TradeNotFound(trade_id.clone()))?;
        let push_amount = trade
            .total
            .round_up_to_shilling()
            .map_err(|e| PaymentGatewayError::ValidationError(e.to_string()))?;
        let request = self.db.create_retry_attempt(trade_id, trade.buyer_phone.clone(), push_amount).await?;
        info!("💻️ Retrying payment for trade {} (attempt #{})", trade.trade_id, request.attempt);
        self.push_payment(trade, request, allow_simulated).await
    }

    async fn store_new_trade(&self, order: &TradeOrder) -> Result<(Trade, PaymentRequest), PaymentGatewayError> {
        if !order.energy.is_positive() {
            return Err(PaymentGatewayError::ValidationError(format!("Energy must be positive, got {}", order.energy)));
        }
        if !order.unit_price.is_positive() {
            return Err(PaymentGatewayError::ValidationError(format!(
                "Unit price must be positive, got {}",
                order.unit_price
            )));
        }
        let buyer_phone = normalize_phone(&order.buyer_phone)
            .map_err(|e| PaymentGatewayError::ValidationError(format!("Invalid buyer phone: {e}")))?;
        let seller_phone = normalize_phone(&order.seller_phone)
            .map_err(|e| PaymentGatewayError::ValidationError(format!("Invalid seller phone: {e}")))?;
        if buyer_phone == seller_phone {
            return Err(PaymentGatewayError::ValidationError("Buyer and seller cannot be the same number".to_string()));
        }
        let total = Cents::for_energy(order.energy, order.unit_price)
            .map_err(|e| PaymentGatewayError::ValidationError(e.to_string()))?;
        if !total.is_positive() {
            return Err(PaymentGatewayError::ValidationError(format!(
                "Trade of {} at {}/kWh amounts to nothing",
                order.energy, order.unit_price
            )));
        }
        // The provider collects whole shillings; the exact total stays on the trade for bookkeeping.
        let push_amount =
            total.round_up_to_shilling().map_err(|e| PaymentGatewayError::ValidationError(e.to_string()))?;
        let trade = NewTrade {
            trade_id: new_trade_id(),
            direction: order.direction,
            energy: order.energy,
            unit_price: order.unit_price,
            total,
            buyer_phone: buyer_phone.clone(),
            seller_phone,
        };
        // The buyer funds the settlement in both directions; direction only records who initiated.
        self.db.create_trade_with_request(trade, buyer_phone, push_amount).await
    }

    /// Sends the push through the real provider if one is configured and healthy; otherwise falls back to the mock,
    /// but only with the caller's consent and the deployment's blessing.
    async fn push_payment(
        &self,
        trade: Trade,
        request: PaymentRequest,
        allow_simulated: bool,
    ) -> Result<TradeOutcome, PaymentGatewayError> {
        let push = PushRequest {
            trade_id: trade.trade_id.clone(),
            phone: request.phone.clone(),
            amount: request.amount,
            reference: format!("ENERGY_{}", trade.trade_id),
            description: format!("Energy purchase: {} at {}/kWh", trade.energy, trade.unit_price),
        };

        if let Some(provider) = &self.provider {
            if self.health.is_available() {
                match provider.initiate(push.clone()).await {
                    Ok(init) => {
                        self.health.record_success();
                        let request = self.db.set_correlation_ids(request.id, &init.merchant_request_id, &init.checkout_request_id).await?;
                        debug!("💻️ Push accepted for trade {}: checkout id {}", trade.trade_id, init.checkout_request_id);
                        return Ok(TradeOutcome { trade, payment_request: request, customer_message: init.customer_message });
                    },
                    Err(e @ (PaymentProviderError::Unavailable(_) | PaymentProviderError::Auth(_))) => {
                        warn!("💻️ Payment provider is down ({e}). Considering simulated settlement for trade {}.", trade.trade_id);
                        self.health.record_failure();
                    },
                    Err(e) => {
                        // An explicit rejection is not an outage; failing over to the mock would mask a real bug.
                        let (_request, _trade) = self.db.abort_initiated_request(&trade.trade_id, &e.to_string(), true).await?;
                        return Err(PaymentGatewayError::ProviderError(e.to_string()));
                    },
                }
            } else {
                debug!("💻️ Provider circuit breaker is open. Considering simulated settlement for trade {}.", trade.trade_id);
            }
        }

        if !self.allow_mock_fallback || !allow_simulated {
            let reason = "Payment provider unavailable and simulated settlement not permitted";
            let (_request, _trade) = self.db.abort_initiated_request(&trade.trade_id, reason, true).await?;
            return Err(PaymentGatewayError::ProviderError(reason.to_string()));
        }

        let init = self.simulate_push(push).await?;
        let request = self.db.set_correlation_ids(request.id, &init.merchant_request_id, &init.checkout_request_id).await?;
        let trade = self.db.mark_trade_simulated(&trade.trade_id).await?;
        info!("💻️ Trade {} is settling through the simulated provider", trade.trade_id);
        Ok(TradeOutcome { trade, payment_request: request, customer_message: init.customer_message })
    }

    async fn simulate_push(&self, push: PushRequest) -> Result<PushInit, PaymentGatewayError> {
        self.mock.initiate(push).await.map_err(|e| PaymentGatewayError::ProviderError(e.to_string()))
    }
}
