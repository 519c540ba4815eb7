use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use log::*;

/// A shared circuit-breaker for the real payment provider.
///
/// After a transport or authentication failure the provider is considered down for the cool-down period, and
/// [`TradeFlowApi`](crate::TradeFlowApi) routes new trades straight to the simulated provider instead of paying the
/// connection-timeout tax on every request. A successful call clears the breaker immediately.
#[derive(Clone)]
pub struct ProviderHealth {
    last_failure: Arc<Mutex<Option<Instant>>>,
    cooldown: Duration,
}

impl ProviderHealth {
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(120);

    pub fn new(cooldown: Duration) -> Self {
        Self { last_failure: Arc::new(Mutex::new(None)), cooldown }
    }

    pub fn is_available(&self) -> bool {
        let last_failure = match self.last_failure.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        match last_failure {
            Some(at) => at.elapsed() >= self.cooldown,
            None => true,
        }
    }

    pub fn record_failure(&self) {
        let mut guard = match self.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            warn!("🏥️ Payment provider marked unavailable for the next {:?}", self.cooldown);
        }
        *guard = Some(Instant::now());
    }

    pub fn record_success(&self) {
        let mut guard = match self.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            info!("🏥️ Payment provider is reachable again");
        }
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn starts_available() {
        let health = ProviderHealth::default();
        assert!(health.is_available());
    }

    #[test]
    fn failure_trips_the_breaker_and_success_clears_it() {
        let health = ProviderHealth::new(Duration::from_secs(3600));
        health.record_failure();
        assert!(!health.is_available());
        health.record_success();
        assert!(health.is_available());
    }

    #[test]
    fn breaker_resets_after_the_cooldown() {
        let health = ProviderHealth::new(Duration::ZERO);
        health.record_failure();
        assert!(health.is_available());
    }
}
