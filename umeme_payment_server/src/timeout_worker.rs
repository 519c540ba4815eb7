use chrono::Duration;
use log::*;
use umeme_payment_engine::{db_types::PaymentRequest, traits::PaymentGatewayDatabase, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the payment timeout worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, payment requests that have waited longer than `timeout` for a provider answer are marked `Timeout`.
/// Their trades stay `Pending`, so the payer can be prompted again with a retry.
pub fn start_timeout_worker(db: SqliteDatabase, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Payment timeout worker started (window: {}s)", timeout.num_seconds());
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment timeout sweep");
            match db.expire_stale_requests(timeout).await {
                Ok(expired) if expired.is_empty() => {},
                Ok(expired) => {
                    info!("🕰️ {} payment request(s) timed out: {}", expired.len(), request_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment timeout sweep: {e}");
                },
            }
        }
    })
}

fn request_list(requests: &[PaymentRequest]) -> String {
    requests
        .iter()
        .map(|r| format!("[#{}] trade: {} attempt: {}", r.id, r.trade_id, r.attempt))
        .collect::<Vec<String>>()
        .join(", ")
}
