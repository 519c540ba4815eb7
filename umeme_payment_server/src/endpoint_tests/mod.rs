//! In-process endpoint tests. Each test runs the full route wiring against a fresh in-memory store; no real provider
//! is configured, so trades settle through the simulated provider.

use std::time::Duration;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use umeme_payment_engine::{MockProvider, ProviderHealth, ReconciliationApi, SqliteDatabase, StatusApi, TradeFlowApi};

use crate::{
    integrations::DarajaProvider,
    routes::{
        health,
        CancelTradeRoute,
        ExecuteTradeRoute,
        PaymentCallbackRoute,
        PaymentStatusRoute,
        RetryTradeRoute,
        TradeDetailRoute,
    },
};

macro_rules! test_app {
    ($db:expr) => {{
        let db = $db.clone();
        let mock = MockProvider::new(db.clone(), Duration::from_millis(20));
        let trade_api = TradeFlowApi::<SqliteDatabase, DarajaProvider>::new(
            db.clone(),
            None,
            mock.clone(),
            ProviderHealth::default(),
            true,
        );
        let status_api = StatusApi::<SqliteDatabase, DarajaProvider>::new(db.clone(), None, mock.clone());
        let reconciler = ReconciliationApi::new(db.clone());
        test::init_service(
            App::new()
                .app_data(web::Data::new(trade_api))
                .app_data(web::Data::new(status_api))
                .app_data(web::Data::new(reconciler))
                .app_data(web::Data::new(db.clone()))
                .service(health)
                .service(
                    web::scope("/api")
                        .service(ExecuteTradeRoute::<SqliteDatabase, DarajaProvider>::new())
                        .service(TradeDetailRoute::<SqliteDatabase>::new())
                        .service(CancelTradeRoute::<SqliteDatabase, DarajaProvider>::new())
                        .service(RetryTradeRoute::<SqliteDatabase, DarajaProvider>::new())
                        .service(PaymentCallbackRoute::<SqliteDatabase>::new())
                        .service(PaymentStatusRoute::<SqliteDatabase, DarajaProvider>::new()),
                ),
        )
        .await
    }};
}

async fn new_db() -> SqliteDatabase {
    SqliteDatabase::new_in_memory().await.expect("in-memory database should always open")
}

fn trade_body() -> Value {
    json!({
        "direction": "Buy",
        "energy_kwh": 2.5,
        "unit_price": 12.0,
        "buyer_phone": "0712345678",
        "seller_phone": "0798765432"
    })
}

#[actix_web::test]
async fn health_check_says_hi() {
    let db = new_db().await;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let body = test::read_body(res).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn executing_a_trade_settles_through_the_simulated_provider() {
    let db = new_db().await;
    let app = test_app!(db);

    let req = test::TestRequest::post().uri("/api/execute_trade").set_json(trade_body()).to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(res["simulated"], json!(true));
    assert_eq!(res["status"], json!("Pending"));
    assert_eq!(res["total"], json!(3000));
    assert_eq!(res["amount"], json!(3000));
    let request_id = res["payment_request_id"].as_i64().expect("payment_request_id should be numeric");

    // The mock settles after its delay; the status endpoint then reports the confirmation.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let req = test::TestRequest::get().uri(&format!("/api/payment/status/{request_id}")).to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["status"], json!("Confirmed"));
    assert!(status["receipt_number"].as_str().expect("receipt expected").starts_with("SIM"));

    let trade_id = res["trade_id"].as_str().expect("trade_id should be a string");
    let req = test::TestRequest::get().uri(&format!("/api/trade/{trade_id}")).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["trade"]["status"], json!("Paid"));
    assert_eq!(detail["active_payment_request"], Value::Null);
}

#[actix_web::test]
async fn an_invalid_phone_number_is_a_bad_request() {
    let db = new_db().await;
    let app = test_app!(db);
    let mut body = trade_body();
    body["buyer_phone"] = json!("12345");
    let req = test::TestRequest::post().uri("/api/execute_trade").set_json(body).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), actix_web::http::StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn callbacks_are_always_acknowledged() {
    let db = new_db().await;
    let app = test_app!(db);

    // A structurally valid callback for a checkout id nobody has heard of.
    let envelope = json!({
        "Body": { "stkCallback": {
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_NOBODY",
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully."
        }}
    });
    let req = test::TestRequest::post().uri("/api/payment/callback").set_json(envelope).to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(res["ResultCode"], json!(0));

    // Garbage gets the same treatment.
    let req = test::TestRequest::post().uri("/api/payment/callback").set_payload("not json").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
}

#[actix_web::test]
async fn unknown_payment_request_is_not_found() {
    let db = new_db().await;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri("/api/payment/status/999").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), actix_web::http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn a_pending_trade_can_be_cancelled_over_http() {
    let db = new_db().await;
    // A long mock delay keeps the payment request open while we cancel.
    let mock = MockProvider::new(db.clone(), Duration::from_secs(3600));
    let trade_api = TradeFlowApi::<SqliteDatabase, DarajaProvider>::new(
        db.clone(),
        None,
        mock.clone(),
        ProviderHealth::default(),
        true,
    );
    let status_api = StatusApi::<SqliteDatabase, DarajaProvider>::new(db.clone(), None, mock.clone());
    let reconciler = ReconciliationApi::new(db.clone());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(trade_api))
            .app_data(web::Data::new(status_api))
            .app_data(web::Data::new(reconciler))
            .service(
                web::scope("/api")
                    .service(ExecuteTradeRoute::<SqliteDatabase, DarajaProvider>::new())
                    .service(CancelTradeRoute::<SqliteDatabase, DarajaProvider>::new()),
            ),
    )
    .await;

    let req = test::TestRequest::post().uri("/api/execute_trade").set_json(trade_body()).to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;
    let trade_id = res["trade_id"].as_str().expect("trade_id should be a string");

    let req = test::TestRequest::post().uri(&format!("/api/trade/{trade_id}/cancel")).to_request();
    let cancelled: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cancelled["status"], json!("Cancelled"));

    // A second cancellation is a conflict.
    let req = test::TestRequest::post().uri(&format!("/api/trade/{trade_id}/cancel")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), actix_web::http::StatusCode::CONFLICT);
}
