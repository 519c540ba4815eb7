//! Umeme Payment Engine
//!
//! The settlement core for the Umeme energy trading gateway. Households trade surplus solar energy; this library
//! turns an agreed trade into a mobile-money push payment and tracks the payment's asynchronous confirmation.
//!
//! The library is split into:
//! 1. Database management ([`SqliteDatabase`] behind the [`traits::PaymentGatewayDatabase`] trait). You should never
//!    need to touch the database directly; the data types in [`db_types`] are public, the queries are not.
//! 2. The payment flow API ([`mod@upe_api`]): trade execution ([`TradeFlowApi`]), callback/poll reconciliation
//!    ([`ReconciliationApi`]) and on-demand status polling ([`StatusApi`]). Every state transition for a payment
//!    request funnels through the reconciliation path, whether it arrived as a provider webhook, a status poll or a
//!    simulated settlement.
//! 3. Provider plumbing: the [`traits::PaymentProvider`] capability implemented by real gateways elsewhere, and the
//!    in-process [`MockProvider`] used when no real gateway is configured.

pub mod advisor;
pub mod db_types;
pub mod health;
pub mod helpers;
mod mock;
mod sqlite;
pub mod traits;
pub mod upe_api;

pub use health::ProviderHealth;
pub use mock::{MockProvider, MOCK_CUSTOMER_MESSAGE};
pub use sqlite::SqliteDatabase;
pub use upe_api::{
    payment_objects,
    reconciliation_api::ReconciliationApi,
    status_api::StatusApi,
    trade_flow_api::TradeFlowApi,
};
