//! End-to-end trade execution against the in-memory store.

mod support;

use std::time::Duration;

use support::{new_db, order, wait_until_terminal, DownProvider, ManualProvider};
use umeme_payment_engine::{
    db_types::{PaymentStatus, TradeStatus},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
    MockProvider, ProviderHealth, TradeFlowApi,
};
use upg_common::{Cents, WattHours};

fn mock_for(db: &umeme_payment_engine::SqliteDatabase) -> MockProvider<umeme_payment_engine::SqliteDatabase> {
    MockProvider::new(db.clone(), Duration::from_millis(25))
}

#[tokio::test]
async fn trade_without_a_real_provider_settles_via_the_mock() {
    let db = new_db().await;
    let api = TradeFlowApi::<_, DownProvider>::new(db.clone(), None, mock_for(&db), ProviderHealth::default(), true);

    let outcome = api.execute_trade(order(3, Cents::from_shillings(12))).await.unwrap();
    assert!(outcome.is_simulated());
    assert_eq!(outcome.trade.total, Cents::from(3600));
    assert_eq!(outcome.payment_request.amount, Cents::from(3600));
    assert_eq!(outcome.payment_request.status, PaymentStatus::Initiated);
    assert!(outcome.payment_request.checkout_request_id.as_deref().unwrap().starts_with("ws_CO_MOCK"));

    let request = wait_until_terminal(&db, outcome.payment_request.id).await;
    assert_eq!(request.status, PaymentStatus::Confirmed);
    assert!(request.receipt_number.as_deref().unwrap().starts_with("SIM"));
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Paid);
    assert!(trade.simulated);
}

#[tokio::test]
async fn fractional_totals_are_collected_as_whole_shillings() {
    let db = new_db().await;
    let api = TradeFlowApi::<_, DownProvider>::new(db.clone(), None, mock_for(&db), ProviderHealth::default(), true);

    // 3 kWh at KSh 12.45/kWh = KSh 37.35; the provider is asked for KSh 38.
    let outcome = api.execute_trade(order(3, Cents::from(1245))).await.unwrap();
    assert_eq!(outcome.trade.total, Cents::from(3735));
    assert_eq!(outcome.payment_request.amount, Cents::from(3800));

    // The callback echoes the pushed amount, so settlement still clears the amount check.
    let request = wait_until_terminal(&db, outcome.payment_request.id).await;
    assert_eq!(request.status, PaymentStatus::Confirmed);
}

#[tokio::test]
async fn unreachable_provider_falls_back_to_the_mock() {
    let db = new_db().await;
    let health = ProviderHealth::default();
    let api = TradeFlowApi::new(db.clone(), Some(DownProvider), mock_for(&db), health.clone(), true);

    let outcome = api.execute_trade(order(1, Cents::from_shillings(10))).await.unwrap();
    assert!(outcome.is_simulated());
    // The failure trips the circuit breaker for subsequent trades.
    assert!(!health.is_available());
}

#[tokio::test]
async fn fallback_needs_both_deployment_and_caller_consent() {
    let db = new_db().await;

    // Deployment forbids it.
    let api = TradeFlowApi::new(db.clone(), Some(DownProvider), mock_for(&db), ProviderHealth::default(), false);
    let err = api.execute_trade(order(1, Cents::from_shillings(10))).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ProviderError(_)));

    // Caller forbids it.
    let api = TradeFlowApi::new(db.clone(), Some(DownProvider), mock_for(&db), ProviderHealth::default(), true);
    let mut declined = order(1, Cents::from_shillings(10));
    declined.allow_simulated = false;
    let err = api.execute_trade(declined).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ProviderError(_)));
}

#[tokio::test]
async fn invalid_orders_are_rejected_before_any_side_effect() {
    let db = new_db().await;
    let api = TradeFlowApi::<_, DownProvider>::new(db.clone(), None, mock_for(&db), ProviderHealth::default(), true);

    let zero_energy = order(0, Cents::from_shillings(10));
    assert!(matches!(api.execute_trade(zero_energy).await, Err(PaymentGatewayError::ValidationError(_))));

    let mut bad_phone = order(1, Cents::from_shillings(10));
    bad_phone.buyer_phone = "12345".to_string();
    assert!(matches!(api.execute_trade(bad_phone).await, Err(PaymentGatewayError::ValidationError(_))));

    let mut self_trade = order(1, Cents::from_shillings(10));
    self_trade.seller_phone = self_trade.buyer_phone.clone();
    assert!(matches!(api.execute_trade(self_trade).await, Err(PaymentGatewayError::ValidationError(_))));
}

#[tokio::test]
async fn astronomical_totals_are_rejected_not_wrapped() {
    let db = new_db().await;
    let api = TradeFlowApi::<_, DownProvider>::new(db.clone(), None, mock_for(&db), ProviderHealth::default(), true);

    // Petawatt-hours at KSh 120/kWh overflow an i64 of cents; the order must bounce, not store a wrapped total.
    let mut huge = order(1, Cents::from_shillings(120));
    huge.energy = WattHours::try_from_kwh_f64(2.0e15).unwrap();
    assert!(matches!(api.execute_trade(huge).await, Err(PaymentGatewayError::ValidationError(_))));
}

#[tokio::test]
async fn cancellation_is_only_possible_before_settlement() {
    let db = new_db().await;
    let provider = ManualProvider::default();
    let api = TradeFlowApi::new(db.clone(), Some(provider), mock_for(&db), ProviderHealth::default(), true);

    let outcome = api.execute_trade(order(2, Cents::from_shillings(15))).await.unwrap();
    let (trade, request) = api.cancel_trade(&outcome.trade.trade_id).await.unwrap();
    assert_eq!(trade.status, TradeStatus::Cancelled);
    assert_eq!(request.status, PaymentStatus::Failed);

    let err = api.cancel_trade(&outcome.trade.trade_id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::CancellationForbidden(_)));
}

#[tokio::test]
async fn timed_out_trades_can_be_retried_with_a_fresh_attempt() {
    let db = new_db().await;
    let provider = ManualProvider::default();
    let api = TradeFlowApi::new(db.clone(), Some(provider), mock_for(&db), ProviderHealth::default(), true);

    let outcome = api.execute_trade(order(2, Cents::from_shillings(20))).await.unwrap();

    // A zero-length window times out the attempt immediately.
    let expired = db.expire_stale_requests(chrono::Duration::zero()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, PaymentStatus::Timeout);
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Pending, "a timeout must leave the trade retryable");

    let retried = api.retry_payment(&outcome.trade.trade_id, true).await.unwrap();
    assert_eq!(retried.payment_request.attempt, 2);
    assert_eq!(retried.payment_request.status, PaymentStatus::Initiated);
    assert_ne!(retried.payment_request.checkout_request_id, outcome.payment_request.checkout_request_id);

    // A second retry while the new attempt is open is forbidden.
    let err = api.retry_payment(&outcome.trade.trade_id, true).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::RetryForbidden(_)));
}
