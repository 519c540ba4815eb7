//! A standalone client for the Safaricom M-Pesa "Daraja" REST API.
//!
//! The payment engine only ever sees the [`api::DarajaApi`] surface: OAuth token management, STK push initiation and
//! STK push status queries. Everything Daraja-specific (wire field names, password derivation, the callback envelope)
//! lives in this crate so that the engine stays provider-agnostic.

pub mod api;
pub mod config;
pub mod data_objects;
mod error;
pub mod helpers;
pub mod token;

pub use api::DarajaApi;
pub use config::{DarajaConfig, DarajaEnvironment};
pub use data_objects::{CallbackEnvelope, StkCallback, StkPushResponse, StkQueryResponse};
pub use error::DarajaApiError;
pub use token::{TokenManager, TokenResponse, TokenSource};
