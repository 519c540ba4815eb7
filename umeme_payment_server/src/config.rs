use std::env;

use chrono::Duration;
use daraja_tools::DarajaConfig;
use log::*;

const DEFAULT_UPG_HOST: &str = "127.0.0.1";
const DEFAULT_UPG_PORT: u16 = 8360;
const DEFAULT_PAYMENT_TIMEOUT_SECONDS: i64 = 180;
const DEFAULT_MOCK_SETTLE_DELAY_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Daraja (M-Pesa) credentials and endpoints. When no credentials are configured the live integration is
    /// disabled entirely and trades settle through the simulated provider.
    pub daraja: DarajaConfig,
    /// If true, a trade whose push cannot reach the real provider may settle through the simulated provider instead,
    /// provided the caller also opted in.
    pub allow_mock_fallback: bool,
    /// How long a payment request may wait for a provider answer before the sweeper times it out.
    pub payment_timeout: Duration,
    /// Settling delay of the simulated provider.
    pub mock_settle_delay: std::time::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_UPG_HOST.to_string(),
            port: DEFAULT_UPG_PORT,
            database_url: String::default(),
            daraja: DarajaConfig::default(),
            allow_mock_fallback: true,
            payment_timeout: Duration::seconds(DEFAULT_PAYMENT_TIMEOUT_SECONDS),
            mock_settle_delay: std::time::Duration::from_millis(DEFAULT_MOCK_SETTLE_DELAY_MS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("UPG_HOST").ok().unwrap_or_else(|| DEFAULT_UPG_HOST.into());
        let port = env::var("UPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for UPG_PORT. {e} Using the default, {DEFAULT_UPG_PORT}, instead."
                    );
                    DEFAULT_UPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_UPG_PORT);
        let database_url = env::var("UPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ UPG_DATABASE_URL is not set. Please set it to the URL for the trade store.");
            String::default()
        });
        let daraja = DarajaConfig::new_from_env_or_default();
        let allow_mock_fallback =
            env::var("UPG_ALLOW_MOCK_FALLBACK").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        let payment_timeout = env::var("UPG_PAYMENT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_PAYMENT_TIMEOUT_SECONDS));
        let mock_settle_delay = env::var("UPG_MOCK_SETTLE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| std::time::Duration::from_millis(DEFAULT_MOCK_SETTLE_DELAY_MS));
        Self { host, port, database_url, daraja, allow_mock_fallback, payment_timeout, mock_settle_delay }
    }
}
