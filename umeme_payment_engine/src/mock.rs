//! A simulated payment provider for development, demos, and provider outages.
//!
//! The mock accepts every push, waits a configurable settling delay, then feeds a synthetic success verdict through
//! the very same [`ReconciliationApi`] path that real callbacks use. No real money moves; trades settled this way
//! are flagged `simulated` in the store.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::*;
use tokio::time::sleep;
use upg_common::Cents;

use crate::{
    traits::{PaymentGatewayDatabase, PaymentProvider, PaymentProviderError, ProviderStatusResult, PushInit, PushRequest},
    upe_api::{
        payment_objects::{EventSource, PaymentEvent},
        reconciliation_api::ReconciliationApi,
    },
};

pub const MOCK_CUSTOMER_MESSAGE: &str = "Simulated payment accepted. No real money moves.";

#[derive(Debug, Clone)]
struct MockPush {
    amount: Cents,
    settles_at: Instant,
}

pub struct MockProvider<B> {
    db: B,
    delay: Duration,
    counter: Arc<AtomicU64>,
    pushes: Arc<Mutex<HashMap<String, MockPush>>>,
}

impl<B> Clone for MockProvider<B>
where B: Clone
{
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            delay: self.delay,
            counter: Arc::clone(&self.counter),
            pushes: Arc::clone(&self.pushes),
        }
    }
}

impl<B> MockProvider<B>
where B: PaymentGatewayDatabase + 'static
{
    pub fn new(db: B, delay: Duration) -> Self {
        Self { db, delay, counter: Arc::new(AtomicU64::new(0)), pushes: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn record_push(&self, checkout_request_id: &str, amount: Cents) {
        let mut pushes = match self.pushes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pushes.insert(checkout_request_id.to_string(), MockPush { amount, settles_at: Instant::now() + self.delay });
    }

    fn lookup_push(&self, checkout_request_id: &str) -> Option<MockPush> {
        let pushes = match self.pushes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pushes.get(checkout_request_id).cloned()
    }

    fn settlement(n: u64, amount: Cents, checkout_request_id: &str, source: EventSource) -> PaymentEvent {
        PaymentEvent {
            merchant_request_id: Some(format!("MOCK-MR-{n}")),
            checkout_request_id: checkout_request_id.to_string(),
            result_code: 0,
            result_desc: "The service request is processed successfully.".to_string(),
            amount: Some(amount),
            receipt_number: Some(format!("SIM{n:08}")),
            phone: None,
            source,
        }
    }
}

#[async_trait]
impl<B> PaymentProvider for MockProvider<B>
where B: PaymentGatewayDatabase + 'static
{
    async fn initiate(&self, request: PushRequest) -> Result<PushInit, PaymentProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let checkout_request_id = format!("ws_CO_MOCK{n:08}");
        self.record_push(&checkout_request_id, request.amount);
        info!(
            "🎭️ Simulated push of {} to {} for trade {}. Settling in {:?}.",
            request.amount, request.phone, request.trade_id, self.delay
        );

        let db = self.db.clone();
        let delay = self.delay;
        let event = Self::settlement(n, request.amount, &checkout_request_id, EventSource::Simulated);
        tokio::spawn(async move {
            sleep(delay).await;
            let reconciler = ReconciliationApi::new(db);
            if let Err(e) = reconciler.process_event(event).await {
                error!("🎭️ Simulated settlement failed to reconcile: {e}");
            }
        });

        Ok(PushInit {
            merchant_request_id: format!("MOCK-MR-{n}"),
            checkout_request_id,
            customer_message: Some(MOCK_CUSTOMER_MESSAGE.to_string()),
        })
    }

    async fn query_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<ProviderStatusResult>, PaymentProviderError> {
        let Some(push) = self.lookup_push(checkout_request_id) else {
            return Err(PaymentProviderError::Rejected {
                code: "404.001.03".to_string(),
                message: format!("Unknown checkout request id {checkout_request_id}"),
            });
        };
        if Instant::now() < push.settles_at {
            return Ok(None);
        }
        // Derive the same receipt the settlement task produced for this push.
        let n: u64 = checkout_request_id.trim_start_matches("ws_CO_MOCK").parse().unwrap_or(0);
        Ok(Some(ProviderStatusResult {
            result_code: 0,
            result_desc: "The service request is processed successfully.".to_string(),
            receipt_number: Some(format!("SIM{n:08}")),
            amount: Some(push.amount),
        }))
    }
}
