//! The single entry point for provider verdicts.
//!
//! Callbacks, poll results and simulated settlements all become [`PaymentEvent`]s and go through
//! [`ReconciliationApi::process_event`]. The method is idempotent: replays are no-ops, conflicting replays are
//! logged and discarded, and a callback/poll race for the same correlation id resolves to exactly one winner via the
//! database claim.

use log::*;
use tokio::time::sleep;

use crate::{
    db_types::{PaymentRequest, PaymentStatus},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
    upe_api::payment_objects::{EventSource, PaymentEvent, ReconcileOutcome},
};

/// How many times, and how far apart, to re-look-up a callback that arrived before the correlation ids were stored.
/// The provider can fire its webhook before our `set_correlation_ids` write lands.
const ORPHAN_LOOKUP_RETRIES: u32 = 5;
const ORPHAN_LOOKUP_PAUSE_MS: u64 = 200;

#[derive(Clone)]
pub struct ReconciliationApi<B> {
    db: B,
    lookup_retries: u32,
    lookup_pause: std::time::Duration,
}

impl<B> ReconciliationApi<B>
where B: PaymentGatewayDatabase
{
    pub fn new(db: B) -> Self {
        Self {
            db,
            lookup_retries: ORPHAN_LOOKUP_RETRIES,
            lookup_pause: std::time::Duration::from_millis(ORPHAN_LOOKUP_PAUSE_MS),
        }
    }

    /// Reconciles one provider verdict against the store. See [`ReconcileOutcome`] for the possible results; an
    /// `Err` is reserved for infrastructure failures, never for "uninteresting" events like replays or orphans.
    pub async fn process_event(&self, event: PaymentEvent) -> Result<ReconcileOutcome, PaymentGatewayError> {
        let checkout_id = event.checkout_request_id.clone();
        let Some(request) = self.find_request(&event).await? else {
            warn!(
                "🔄️ Discarding {:?} event for unknown checkout request {checkout_id} (code {})",
                event.source, event.result_code
            );
            return Ok(ReconcileOutcome::Orphaned);
        };

        if request.status.is_terminal() {
            return Ok(self.check_replay(&request, &event));
        }

        // The claim is the serialisation point. Losing it means a concurrent event got there first.
        let Some(claimed) = self.db.claim_payment_event(&checkout_id).await? else {
            let Some(request) = self.db.fetch_payment_request_by_checkout_id(&checkout_id).await? else {
                warn!("🔄️ Payment request for {checkout_id} vanished mid-reconciliation");
                return Ok(ReconcileOutcome::Orphaned);
            };
            if request.status.is_terminal() {
                return Ok(self.check_replay(&request, &event));
            }
            debug!("🔄️ Checkout request {checkout_id} is being reconciled by a concurrent event. Standing down.");
            return Ok(ReconcileOutcome::AlreadyInFlight);
        };

        if event.is_success() {
            self.settle_success(claimed, event).await
        } else {
            let (request, _trade) =
                self.db.fail_payment(&checkout_id, Some(event.result_code), &event.result_desc, true).await?;
            info!(
                "🔄️ Payment request #{} failed (code {}): {}. Trade {} failed.",
                request.id, event.result_code, event.result_desc, request.trade_id
            );
            Ok(ReconcileOutcome::Failed(request))
        }
    }

    /// A successful verdict still has to clear the amount check before anyone gets credited.
    async fn settle_success(
        &self,
        claimed: PaymentRequest,
        event: PaymentEvent,
    ) -> Result<ReconcileOutcome, PaymentGatewayError> {
        if let Some(got) = event.amount {
            if got != claimed.amount {
                let mismatch = PaymentGatewayError::AmountMismatch { want: claimed.amount, got };
                error!("🔄️ Payment request #{}: {mismatch}. Failing the payment for manual review.", claimed.id);
                let (request, _trade) = self
                    .db
                    .fail_payment(&event.checkout_request_id, Some(event.result_code), &mismatch.to_string(), true)
                    .await?;
                return Ok(ReconcileOutcome::Failed(request));
            }
        }
        let (request, trade) = self
            .db
            .confirm_payment(
                &event.checkout_request_id,
                event.receipt_number.as_deref(),
                event.result_code,
                &event.result_desc,
            )
            .await?;
        info!(
            "🔄️ Payment request #{} confirmed via {:?} (receipt: {}). Trade {} is paid.",
            request.id,
            event.source,
            request.receipt_number.as_deref().unwrap_or("none"),
            trade.trade_id
        );
        Ok(ReconcileOutcome::Confirmed(request))
    }

    /// An event against a terminal request is either a harmless replay or a contradiction. The stored outcome is
    /// authoritative either way; the distinction only decides the log level.
    ///
    /// A replay must agree on the result code, and on the receipt when it carries one (polls carry none, so their
    /// replays are judged on the code alone).
    fn check_replay(&self, request: &PaymentRequest, event: &PaymentEvent) -> ReconcileOutcome {
        let consistent = match request.status {
            PaymentStatus::Timeout => false,
            _ => {
                request.result_code == Some(event.result_code)
                    && (event.receipt_number.is_none() || event.receipt_number == request.receipt_number)
            },
        };
        if consistent {
            debug!(
                "🔄️ Duplicate {:?} event for payment request #{} (code {}). Ignoring.",
                event.source, request.id, event.result_code
            );
            ReconcileOutcome::Duplicate(request.clone())
        } else {
            let conflict = PaymentGatewayError::CallbackConflict(event.checkout_request_id.clone());
            error!(
                "🔄️ {conflict}. Stored outcome is {} (code {:?}), the {:?} event carries code {}.",
                request.status, request.result_code, event.source, event.result_code
            );
            ReconcileOutcome::Conflict(request.clone())
        }
    }

    /// Looks up the payment request for the event. Callbacks and simulated settlements get a short grace window for
    /// the initiate/webhook race; a poll never needs one, since its correlation id was read from the store.
    async fn find_request(&self, event: &PaymentEvent) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
        let mut request = self.db.fetch_payment_request_by_checkout_id(&event.checkout_request_id).await?;
        if request.is_some() || event.source == EventSource::Poll {
            return Ok(request);
        }
        for _ in 0..self.lookup_retries {
            sleep(self.lookup_pause).await;
            request = self.db.fetch_payment_request_by_checkout_id(&event.checkout_request_id).await?;
            if request.is_some() {
                debug!("🔄️ Early callback for {} matched after a short wait", event.checkout_request_id);
                break;
            }
        }
        Ok(request)
    }
}
