use std::fmt::Display;

use log::*;
use upg_common::Secret;

// Safaricom's published sandbox test credentials. Useless in production, handy everywhere else.
const SANDBOX_SHORTCODE: &str = "174379";
const SANDBOX_PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DarajaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl DarajaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl Display for DarajaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DarajaConfig {
    pub environment: DarajaEnvironment,
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    /// The business shortcode (paybill/till number) payments are collected against.
    pub shortcode: String,
    /// The "Lipa na M-Pesa online" passkey that goes into the STK password derivation.
    pub passkey: Secret<String>,
    /// Where Daraja pushes payment confirmations.
    pub callback_url: String,
}

impl DarajaConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = match std::env::var("MPESA_ENVIRONMENT").as_deref() {
            Ok("production") => DarajaEnvironment::Production,
            Ok("sandbox") | Err(_) => DarajaEnvironment::Sandbox,
            Ok(other) => {
                warn!("🏦️ MPESA_ENVIRONMENT '{other}' is not recognised. Using sandbox.");
                DarajaEnvironment::Sandbox
            },
        };
        let consumer_key = std::env::var("MPESA_CONSUMER_KEY").unwrap_or_default();
        let consumer_secret = Secret::new(std::env::var("MPESA_CONSUMER_SECRET").unwrap_or_default());
        let shortcode = std::env::var("MPESA_BUSINESS_SHORTCODE").unwrap_or_else(|_| SANDBOX_SHORTCODE.to_string());
        let passkey = Secret::new(std::env::var("MPESA_PASSKEY").unwrap_or_else(|_| SANDBOX_PASSKEY.to_string()));
        let callback_url = std::env::var("MPESA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("🏦️ MPESA_CALLBACK_URL not set. Payment confirmations will go nowhere useful.");
            "http://localhost:8360/api/payment/callback".to_string()
        });
        Self { environment, consumer_key, consumer_secret, shortcode, passkey, callback_url }
    }

    /// True when a consumer key/secret pair has been configured. Without one, the live API cannot be used at all and
    /// callers should fall back to a simulated provider.
    pub fn has_credentials(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.reveal().is_empty()
    }
}
