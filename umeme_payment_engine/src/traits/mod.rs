//! The seams of the payment engine.
//!
//! [`PaymentGatewayDatabase`] is the persistence contract a backend must satisfy; [`PaymentProvider`] is the
//! capability contract a payment gateway (real or simulated) must satisfy. The engine is written entirely against
//! these two traits.

mod payment_gateway_database;
mod payment_provider;

pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use payment_provider::{PaymentProvider, PaymentProviderError, ProviderStatusResult, PushInit, PushRequest};
