//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are asynchronous and must never block the worker thread; every slow operation here (database access,
//! provider calls) is awaited.

use actix_web::{get, web, HttpResponse, Responder};
use daraja_tools::CallbackEnvelope;
use log::*;
use serde_json::json;
use umeme_payment_engine::{
    db_types::TradeId,
    payment_objects::{EventSource, PaymentEvent},
    traits::{PaymentGatewayDatabase, PaymentProvider},
    ReconciliationApi,
    StatusApi,
    TradeFlowApi,
};
use upg_common::Cents;

use crate::{
    data_objects::{CallbackAck, StatusResponse, TradeRequest, TradeResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Trades  ----------------------------------------------------
route!(execute_trade => Post "/execute_trade" impl PaymentGatewayDatabase, PaymentProvider);
/// Route handler for the execute_trade endpoint
///
/// Validates the trade, stores it, and prompts the buyer's handset for payment. The response says the push is in
/// flight (or that the trade is settling through the simulated provider); the actual confirmation arrives later on
/// the callback endpoint or via status polling.
pub async fn execute_trade<B, P>(
    body: web::Json<TradeRequest>,
    api: web::Data<TradeFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider + 'static,
{
    let order = body.into_inner().into_order()?;
    debug!("💻️ POST execute_trade: {} {} at {}/kWh", order.direction, order.energy, order.unit_price);
    let outcome = api.execute_trade(order).await?;
    Ok(HttpResponse::Ok().json(TradeResponse::from(outcome)))
}

route!(trade_detail => Get "/trade/{trade_id}" impl PaymentGatewayDatabase);
pub async fn trade_detail<B: PaymentGatewayDatabase + 'static>(
    path: web::Path<TradeId>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let trade_id = path.into_inner();
    debug!("💻️ GET trade {trade_id}");
    let trade = db
        .fetch_trade(&trade_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Trade {trade_id}")))?;
    let active_request = db.fetch_active_request_for_trade(&trade_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "trade": trade, "active_payment_request": active_request })))
}

route!(cancel_trade => Post "/trade/{trade_id}/cancel" impl PaymentGatewayDatabase, PaymentProvider);
pub async fn cancel_trade<B, P>(
    path: web::Path<TradeId>,
    api: web::Data<TradeFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider + 'static,
{
    let trade_id = path.into_inner();
    debug!("💻️ POST cancel trade {trade_id}");
    let (trade, _request) = api.cancel_trade(&trade_id).await?;
    Ok(HttpResponse::Ok().json(trade))
}

route!(retry_trade => Post "/trade/{trade_id}/retry" impl PaymentGatewayDatabase, PaymentProvider);
/// Starts a fresh payment attempt for a trade whose previous attempt timed out or failed.
pub async fn retry_trade<B, P>(
    path: web::Path<TradeId>,
    api: web::Data<TradeFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider + 'static,
{
    let trade_id = path.into_inner();
    debug!("💻️ POST retry trade {trade_id}");
    let outcome = api.retry_payment(&trade_id, true).await?;
    Ok(HttpResponse::Ok().json(TradeResponse::from(outcome)))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_callback => Post "/payment/callback" impl PaymentGatewayDatabase);
/// Route handler for the Daraja payment confirmation webhook.
///
/// Always answers 200 with an acknowledgement body: a non-200 makes Daraja retry the callback, and a callback we
/// cannot use (malformed, unknown id, replay) is our problem to log, not theirs to resend.
pub async fn payment_callback<B: PaymentGatewayDatabase + 'static>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
) -> HttpResponse {
    let envelope = match serde_json::from_slice::<CallbackEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("💻️ Discarding malformed payment callback: {e}");
            return ack();
        },
    };
    let cb = envelope.body.stk_callback;
    debug!("💻️ Payment callback for {} (code {})", cb.checkout_request_id, cb.result_code);
    let amount = cb.amount().and_then(|a| Cents::try_from(a).ok());
    let event = PaymentEvent {
        merchant_request_id: Some(cb.merchant_request_id.clone()),
        checkout_request_id: cb.checkout_request_id.clone(),
        result_code: cb.result_code,
        result_desc: cb.result_desc.clone(),
        amount,
        receipt_number: cb.receipt_number(),
        phone: cb.phone_number(),
        source: EventSource::Callback,
    };
    if let Err(e) = api.process_event(event).await {
        error!("💻️ Payment callback for {} could not be reconciled: {e}", cb.checkout_request_id);
    }
    ack()
}

fn ack() -> HttpResponse {
    HttpResponse::Ok().json(CallbackAck::accepted())
}

route!(payment_status => Get "/payment/status/{id}" impl PaymentGatewayDatabase, PaymentProvider);
/// Route handler for the payment status endpoint
///
/// Returns the stored status, refreshed from the provider if the request is still open. This is the fallback for a
/// webhook that never arrived.
pub async fn payment_status<B, P>(
    path: web::Path<i64>,
    api: web::Data<StatusApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase + 'static,
    P: PaymentProvider + 'static,
{
    let id = path.into_inner();
    trace!("💻️ GET payment status for request #{id}");
    let request = api.poll_status(id).await?;
    Ok(HttpResponse::Ok().json(StatusResponse::from(request)))
}
