//! Adapters that plug external payment gateways into the engine's [`PaymentProvider`] capability.
//!
//! [`PaymentProvider`]: umeme_payment_engine::traits::PaymentProvider

pub mod daraja;

pub use daraja::DarajaProvider;
