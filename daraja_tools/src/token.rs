//! OAuth bearer token caching for the Daraja API.
//!
//! Daraja tokens are valid for an hour. The manager caches the current token and refreshes it shortly before expiry.
//! Refreshes are single-flight: callers serialise on the cache mutex, so only the first caller past the expiry check
//! performs the network call. Everyone queued behind it shares that call's outcome, fresh token and refresh failure
//! alike; only a caller that arrives after a failure gets to try again.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::*;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::DarajaApiError;

/// Refresh this long before the token actually expires.
const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// The token endpoint response. `expires_in` is seconds, and arrives as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: String,
}

/// Anything that can fetch a fresh bearer token. Implemented by [`crate::DarajaApi`] over HTTP, and by stubs in tests.
#[async_trait]
pub trait TokenSource: Sync {
    async fn fetch_token(&self) -> Result<TokenResponse, DarajaApiError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct FailedRefresh {
    at: Instant,
    error: String,
}

#[derive(Debug, Default)]
struct TokenCache {
    token: Option<CachedToken>,
    last_failure: Option<FailedRefresh>,
}

#[derive(Clone)]
pub struct TokenManager {
    cache: Arc<Mutex<TokenCache>>,
    safety_margin: Duration,
}

impl TokenManager {
    pub fn new() -> Self {
        Self { cache: Arc::new(Mutex::new(TokenCache::default())), safety_margin: DEFAULT_SAFETY_MARGIN }
    }

    pub fn with_safety_margin(margin: Duration) -> Self {
        Self { cache: Arc::new(Mutex::new(TokenCache::default())), safety_margin: margin }
    }

    /// Returns a valid bearer token, refreshing it through `source` if the cached one is missing or about to expire.
    ///
    /// A failed refresh propagates to every caller that was already waiting on it, as
    /// [`DarajaApiError::AuthenticationFailed`], without each of them re-hammering the token endpoint. The cache is
    /// not poisoned: the next call that arrives after the failure simply tries again.
    pub async fn access_token<S: TokenSource>(&self, source: &S) -> Result<String, DarajaApiError> {
        let arrived = Instant::now();
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.token.as_ref() {
            if Instant::now() + self.safety_margin < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }
        if let Some(failure) = cache.last_failure.as_ref() {
            // The refresh this caller queued up behind has already failed; its outcome covers this caller too.
            if failure.at >= arrived {
                return Err(DarajaApiError::AuthenticationFailed(failure.error.clone()));
            }
        }
        trace!("🏦️ No valid cached token. Requesting a new one.");
        match Self::refresh(source).await {
            Ok(cached) => {
                let token = cached.token.clone();
                cache.token = Some(cached);
                cache.last_failure = None;
                Ok(token)
            },
            Err(e) => {
                cache.last_failure = Some(FailedRefresh { at: Instant::now(), error: e.to_string() });
                Err(e)
            },
        }
    }

    async fn refresh<S: TokenSource>(source: &S) -> Result<CachedToken, DarajaApiError> {
        let response = source.fetch_token().await?;
        let lifetime = response
            .expires_in
            .parse::<u64>()
            .map_err(|e| DarajaApiError::ResponseError(format!("Invalid expires_in value: {e}")))?;
        debug!("🏦️ Obtained a new access token, valid for {lifetime}s");
        Ok(CachedToken { token: response.access_token, expires_at: Instant::now() + Duration::from_secs(lifetime) })
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}
