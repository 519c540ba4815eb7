use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use umeme_payment_engine::{MockProvider, ProviderHealth, ReconciliationApi, SqliteDatabase, StatusApi, TradeFlowApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
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
    timeout_worker::start_timeout_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = if config.daraja.has_credentials() {
        Some(DarajaProvider::new(config.daraja.clone())?)
    } else {
        warn!("🚀️ No M-Pesa credentials configured. Every trade will settle through the simulated provider.");
        None
    };
    start_timeout_worker(db.clone(), config.payment_timeout);
    let srv = create_server_instance(config, db, provider)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: Option<DarajaProvider>,
) -> Result<Server, ServerError> {
    // The mock and the circuit breaker are shared across workers, so that a settlement recorded by one worker is
    // visible to status polls served by another.
    let mock = MockProvider::new(db.clone(), config.mock_settle_delay);
    let health_state = ProviderHealth::default();
    let allow_mock_fallback = config.allow_mock_fallback;
    let srv = HttpServer::new(move || {
        let trade_api =
            TradeFlowApi::new(db.clone(), provider.clone(), mock.clone(), health_state.clone(), allow_mock_fallback);
        let status_api = StatusApi::new(db.clone(), provider.clone(), mock.clone());
        let reconciler = ReconciliationApi::new(db.clone());
        let api_scope = web::scope("/api")
            .service(ExecuteTradeRoute::<SqliteDatabase, DarajaProvider>::new())
            .service(TradeDetailRoute::<SqliteDatabase>::new())
            .service(CancelTradeRoute::<SqliteDatabase, DarajaProvider>::new())
            .service(RetryTradeRoute::<SqliteDatabase, DarajaProvider>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, DarajaProvider>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("upg::access_log"))
            .app_data(web::Data::new(trade_api))
            .app_data(web::Data::new(status_api))
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(db.clone()))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
