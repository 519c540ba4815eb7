//! Reconciliation semantics: idempotence, amount checking, and the callback/poll race.

mod support;

use std::time::Duration;

use support::{new_db, order, DownProvider, ManualProvider};
use umeme_payment_engine::{
    db_types::{PaymentStatus, TradeStatus},
    payment_objects::{EventSource, PaymentEvent, ReconcileOutcome, TradeOutcome},
    traits::{PaymentGatewayDatabase, ProviderStatusResult},
    MockProvider, ProviderHealth, ReconciliationApi, SqliteDatabase, StatusApi, TradeFlowApi,
};
use upg_common::Cents;

/// Runs a trade against the manual provider, which accepts the push and then stays silent.
async fn pending_trade(db: &SqliteDatabase) -> (TradeOutcome, ManualProvider) {
    let provider = ManualProvider::default();
    let mock = MockProvider::new(db.clone(), Duration::from_secs(3600));
    let api = TradeFlowApi::new(db.clone(), Some(provider.clone()), mock, ProviderHealth::default(), true);
    let outcome = api.execute_trade(order(2, Cents::from_shillings(15))).await.unwrap();
    (outcome, provider)
}

fn callback_for(outcome: &TradeOutcome, result_code: i64, amount: Option<Cents>) -> PaymentEvent {
    PaymentEvent {
        merchant_request_id: outcome.payment_request.merchant_request_id.clone(),
        checkout_request_id: outcome.payment_request.checkout_request_id.clone().unwrap(),
        result_code,
        result_desc: if result_code == 0 {
            "The service request is processed successfully.".to_string()
        } else {
            "Request cancelled by user".to_string()
        },
        amount,
        receipt_number: (result_code == 0).then(|| "SGR7P1KRVA".to_string()),
        phone: Some("254712345678".to_string()),
        source: EventSource::Callback,
    }
}

#[tokio::test]
async fn a_successful_callback_confirms_the_payment_exactly_once() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let reconciler = ReconciliationApi::new(db.clone());

    let event = callback_for(&outcome, 0, Some(outcome.payment_request.amount));
    let first = reconciler.process_event(event.clone()).await.unwrap();
    assert!(matches!(first, ReconcileOutcome::Confirmed(_)));

    let request = db.fetch_payment_request(outcome.payment_request.id).await.unwrap().unwrap();
    assert_eq!(request.status, PaymentStatus::Confirmed);
    assert_eq!(request.receipt_number.as_deref(), Some("SGR7P1KRVA"));
    assert_eq!(request.result_code, Some(0));
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Paid);
    assert!(!trade.simulated);

    // A webhook replay is a no-op.
    let replay = reconciler.process_event(event).await.unwrap();
    assert!(matches!(replay, ReconcileOutcome::Duplicate(_)));
}

#[tokio::test]
async fn a_declined_callback_fails_the_payment_and_the_trade() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let reconciler = ReconciliationApi::new(db.clone());

    let event = callback_for(&outcome, 1032, None);
    let result = reconciler.process_event(event).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Failed(_)));

    let request = db.fetch_payment_request(outcome.payment_request.id).await.unwrap().unwrap();
    assert_eq!(request.status, PaymentStatus::Failed);
    assert_eq!(request.result_code, Some(1032));
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Failed);
}

#[tokio::test]
async fn a_mismatched_amount_never_confirms_the_trade() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let reconciler = ReconciliationApi::new(db.clone());

    let short = outcome.payment_request.amount - Cents::from_shillings(5);
    let event = callback_for(&outcome, 0, Some(short));
    let result = reconciler.process_event(event).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Failed(_)));

    let request = db.fetch_payment_request(outcome.payment_request.id).await.unwrap().unwrap();
    assert_eq!(request.status, PaymentStatus::Failed);
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Failed, "a short payment must never mark the trade paid");
}

#[tokio::test]
async fn a_contradictory_replay_is_rejected_and_the_stored_outcome_kept() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let reconciler = ReconciliationApi::new(db.clone());

    let confirm = callback_for(&outcome, 0, Some(outcome.payment_request.amount));
    reconciler.process_event(confirm).await.unwrap();

    let contradiction = callback_for(&outcome, 1032, None);
    let result = reconciler.process_event(contradiction).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Conflict(_)));

    let request = db.fetch_payment_request(outcome.payment_request.id).await.unwrap().unwrap();
    assert_eq!(request.status, PaymentStatus::Confirmed);
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Paid);
}

#[tokio::test]
async fn a_replay_with_a_different_receipt_is_a_conflict() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let reconciler = ReconciliationApi::new(db.clone());

    let confirm = callback_for(&outcome, 0, Some(outcome.payment_request.amount));
    reconciler.process_event(confirm).await.unwrap();

    // Same result code, different receipt: that is not the same payment being replayed.
    let mut imposter = callback_for(&outcome, 0, Some(outcome.payment_request.amount));
    imposter.receipt_number = Some("SGR0DIFFERENT".to_string());
    let result = reconciler.process_event(imposter).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Conflict(_)));

    // A receipt-less replay (a poll result, say) is judged on the code alone.
    let mut poll_echo = callback_for(&outcome, 0, None);
    poll_echo.receipt_number = None;
    poll_echo.source = EventSource::Poll;
    let result = reconciler.process_event(poll_echo).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Duplicate(_)));

    let request = db.fetch_payment_request(outcome.payment_request.id).await.unwrap().unwrap();
    assert_eq!(request.receipt_number.as_deref(), Some("SGR7P1KRVA"), "the stored receipt must survive the conflict");
}

#[tokio::test]
async fn the_sweep_leaves_a_freshly_claimed_request_alone() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let checkout_id = outcome.payment_request.checkout_request_id.clone().unwrap();

    // Age the request past the window, then claim it as a reconciliation would.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let claimed = db.claim_payment_event(&checkout_id).await.unwrap().expect("the claim must succeed");
    assert_eq!(claimed.status, PaymentStatus::CallbackReceived);

    // The sweep must not time out a claim taken moments ago, however old the request itself is.
    let expired = db.expire_stale_requests(chrono::Duration::seconds(1)).await.unwrap();
    assert!(expired.is_empty(), "a just-claimed request was swept: {expired:?}");

    let (request, trade) = db
        .confirm_payment(&checkout_id, Some("SGR7P1KRVA"), 0, "The service request is processed successfully.")
        .await
        .unwrap();
    assert_eq!(request.status, PaymentStatus::Confirmed);
    assert_eq!(trade.status, TradeStatus::Paid);
}

#[tokio::test]
async fn an_event_for_an_unknown_checkout_id_is_discarded() {
    let db = new_db().await;
    let reconciler = ReconciliationApi::new(db.clone());

    let event = PaymentEvent {
        merchant_request_id: None,
        checkout_request_id: "ws_CO_NOBODY".to_string(),
        result_code: 0,
        result_desc: "The service request is processed successfully.".to_string(),
        amount: Some(Cents::from_shillings(100)),
        receipt_number: Some("SGR000000".to_string()),
        phone: None,
        source: EventSource::Poll,
    };
    let result = reconciler.process_event(event).await.unwrap();
    assert!(matches!(result, ReconcileOutcome::Orphaned));
}

#[tokio::test]
async fn a_callback_and_a_poll_for_the_same_payment_converge() {
    let db = new_db().await;
    let (outcome, provider) = pending_trade(&db).await;
    provider.set_status(ProviderStatusResult {
        result_code: 0,
        result_desc: "The service request is processed successfully.".to_string(),
        receipt_number: None,
        amount: Some(outcome.payment_request.amount),
    });

    let reconciler = ReconciliationApi::new(db.clone());
    let status = StatusApi::new(db.clone(), Some(provider), MockProvider::new(db.clone(), Duration::from_secs(3600)));

    let callback = callback_for(&outcome, 0, Some(outcome.payment_request.amount));
    let (callback_result, poll_result) =
        tokio::join!(reconciler.process_event(callback), status.poll_status(outcome.payment_request.id));
    callback_result.unwrap();
    poll_result.unwrap();

    // Whichever event won the claim, the end state is the same.
    let request = support::wait_until_terminal(&db, outcome.payment_request.id).await;
    assert_eq!(request.status, PaymentStatus::Confirmed);
    let trade = db.fetch_trade(&outcome.trade.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, TradeStatus::Paid);
}

#[tokio::test]
async fn polling_refreshes_an_open_request_from_the_provider() {
    let db = new_db().await;
    let (outcome, provider) = pending_trade(&db).await;
    let status = StatusApi::new(db.clone(), Some(provider.clone()), MockProvider::new(db.clone(), Duration::from_secs(3600)));

    // The payer has not responded yet: no change.
    let unchanged = status.poll_status(outcome.payment_request.id).await.unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Initiated);

    provider.set_status(ProviderStatusResult {
        result_code: 1037,
        result_desc: "DS timeout user cannot be reached".to_string(),
        receipt_number: None,
        amount: None,
    });
    let refreshed = status.poll_status(outcome.payment_request.id).await.unwrap();
    assert_eq!(refreshed.status, PaymentStatus::Failed);
    assert_eq!(refreshed.result_code, Some(1037));
}

#[tokio::test]
async fn a_down_provider_leaves_the_stored_status_untouched() {
    let db = new_db().await;
    let (outcome, _provider) = pending_trade(&db).await;
    let status = StatusApi::new(db.clone(), Some(DownProvider), MockProvider::new(db.clone(), Duration::from_secs(3600)));

    let polled = status.poll_status(outcome.payment_request.id).await.unwrap();
    assert_eq!(polled.status, PaymentStatus::Initiated);
}
