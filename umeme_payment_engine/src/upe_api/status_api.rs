//! On-demand status polling, for when the provider's webhook never arrives.
//!
//! A poll result is just another [`PaymentEvent`]; it goes through the same reconciliation path as a callback, so a
//! poll racing the webhook it was compensating for converges on a single outcome.

use chrono::Duration;
use log::*;

use crate::{
    db_types::PaymentRequest,
    mock::MockProvider,
    traits::{PaymentGatewayDatabase, PaymentGatewayError, PaymentProvider, PaymentProviderError},
    upe_api::{
        payment_objects::{EventSource, PaymentEvent},
        reconciliation_api::ReconciliationApi,
    },
};

pub struct StatusApi<B, P> {
    db: B,
    provider: Option<P>,
    mock: MockProvider<B>,
    reconciler: ReconciliationApi<B>,
}

impl<B, P> StatusApi<B, P>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider,
{
    pub fn new(db: B, provider: Option<P>, mock: MockProvider<B>) -> Self {
        let reconciler = ReconciliationApi::new(db.clone());
        Self { db, provider, mock, reconciler }
    }

    /// The current status of a payment request, refreshed from the provider when the stored one is still open.
    ///
    /// A provider hiccup (or "payer has not responded yet") returns the stored state unchanged; the poll is a
    /// best-effort refresh, never a source of failure on its own.
    pub async fn poll_status(&self, payment_request_id: i64) -> Result<PaymentRequest, PaymentGatewayError> {
        let request = self
            .db
            .fetch_payment_request(payment_request_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::PaymentRequestNotFound(format!("#{payment_request_id}")))?;
        if request.is_terminal() {
            return Ok(request);
        }
        let Some(checkout_id) = request.checkout_request_id.clone() else {
            // Initiation never completed; there is nothing to ask the provider about.
            return Ok(request);
        };
        let trade = self
            .db
            .fetch_trade(&request.trade_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::TradeNotFound(request.trade_id.clone()))?;

        let status = if trade.simulated {
            self.mock.query_status(&checkout_id).await
        } else {
            match &self.provider {
                Some(provider) => provider.query_status(&checkout_id).await,
                None => return Ok(request),
            }
        };

        match status {
            Ok(Some(result)) => {
                let event = PaymentEvent::from_provider_status(&checkout_id, result, EventSource::Poll);
                self.reconciler.process_event(event).await?;
                self.db
                    .fetch_payment_request(payment_request_id)
                    .await?
                    .ok_or_else(|| PaymentGatewayError::PaymentRequestNotFound(format!("#{payment_request_id}")))
            },
            Ok(None) => {
                debug!("🕰️ Checkout request {checkout_id} is still awaiting the payer. No change.");
                Ok(request)
            },
            Err(e @ (PaymentProviderError::Unavailable(_) | PaymentProviderError::Auth(_))) => {
                warn!("🕰️ Status poll for {checkout_id} could not reach the provider: {e}. Returning stored state.");
                Ok(request)
            },
            Err(e) => {
                warn!("🕰️ Status poll for {checkout_id} was rejected: {e}. Returning stored state.");
                Ok(request)
            },
        }
    }

    /// Times out every payment request that has waited longer than `window` for an answer. The owning trades stay
    /// `Pending`, so a timed-out trade can be retried.
    pub async fn expire_stale_requests(&self, window: Duration) -> Result<Vec<PaymentRequest>, PaymentGatewayError> {
        self.db.expire_stale_requests(window).await
    }
}
