//! The public payment-flow API of the engine.
//!
//! [`trade_flow_api::TradeFlowApi`] turns a validated trade order into a push-payment request;
//! [`reconciliation_api::ReconciliationApi`] is the single place where provider events (callbacks, poll results,
//! simulated settlements) become state transitions; [`status_api::StatusApi`] is the synchronous fallback query path.

pub mod payment_objects;
pub mod reconciliation_api;
pub mod status_api;
pub mod trade_flow_api;
