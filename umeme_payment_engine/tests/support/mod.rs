//! Shared scaffolding for the engine integration tests: an in-memory store, canned trade orders, and two scriptable
//! payment providers.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use umeme_payment_engine::{
    db_types::{PaymentRequest, TradeDirection},
    payment_objects::TradeOrder,
    traits::{PaymentGatewayDatabase, PaymentProvider, PaymentProviderError, ProviderStatusResult, PushInit, PushRequest},
    SqliteDatabase,
};
use upg_common::{Cents, WattHours};

pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_in_memory().await.expect("in-memory database should always open")
}

pub fn order(energy_kwh: i64, unit_price: Cents) -> TradeOrder {
    TradeOrder {
        direction: TradeDirection::Buy,
        energy: WattHours::from_kwh(energy_kwh),
        unit_price,
        buyer_phone: "0712345678".to_string(),
        seller_phone: "0798765432".to_string(),
        allow_simulated: true,
    }
}

/// Waits for the mock settlement task to finalise the request, up to a second.
pub async fn wait_until_terminal(db: &SqliteDatabase, request_id: i64) -> PaymentRequest {
    for _ in 0..50 {
        let request = db.fetch_payment_request(request_id).await.expect("fetch should not fail").expect("request exists");
        if request.is_terminal() {
            return request;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("payment request #{request_id} never reached a terminal status");
}

/// A provider that is always down. Doubles as the unused `P` when a test runs without a real provider at all.
#[derive(Debug, Clone, Default)]
pub struct DownProvider;

#[async_trait]
impl PaymentProvider for DownProvider {
    async fn initiate(&self, _request: PushRequest) -> Result<PushInit, PaymentProviderError> {
        Err(PaymentProviderError::Unavailable("connection refused".to_string()))
    }

    async fn query_status(&self, _id: &str) -> Result<Option<ProviderStatusResult>, PaymentProviderError> {
        Err(PaymentProviderError::Unavailable("connection refused".to_string()))
    }
}

/// A provider that accepts every push and then answers status queries with whatever the test scripted.
#[derive(Clone, Default)]
pub struct ManualProvider {
    counter: Arc<AtomicU64>,
    status: Arc<Mutex<Option<ProviderStatusResult>>>,
}

impl ManualProvider {
    pub fn set_status(&self, status: ProviderStatusResult) {
        *self.status.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl PaymentProvider for ManualProvider {
    async fn initiate(&self, _request: PushRequest) -> Result<PushInit, PaymentProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PushInit {
            merchant_request_id: format!("MR-TEST-{n}"),
            checkout_request_id: format!("ws_CO_TEST{n:08}"),
            customer_message: Some("Success. Request accepted for processing".to_string()),
        })
    }

    async fn query_status(&self, _id: &str) -> Result<Option<ProviderStatusResult>, PaymentProviderError> {
        Ok(self.status.lock().unwrap().clone())
    }
}
