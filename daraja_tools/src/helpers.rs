use chrono::{DateTime, Utc};
use upg_common::Secret;

/// Daraja timestamps are `YYYYMMDDHHmmss`. The same timestamp must be used for the password and the payload.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// The STK password is `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &Secret<String>, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{}{timestamp}", passkey.reveal()))
}

/// Basic-auth header value for the OAuth token endpoint.
pub fn basic_auth(consumer_key: &str, consumer_secret: &Secret<String>) -> String {
    format!("Basic {}", base64::encode(format!("{consumer_key}:{}", consumer_secret.reveal())))
}
