//! `SqliteDatabase` is a concrete implementation of an Umeme payment engine backend.
//!
//! Every status transition is a single-row UPDATE with a status precondition, executed inside a transaction where
//! more than one row is involved. That is the whole concurrency story: no process-wide locks, and concurrent
//! callbacks/polls for the same correlation id serialise on the row itself.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Duration;
use log::*;
use sqlx::SqlitePool;
use upg_common::Cents;

use super::db::{db_url, new_pool, payment_requests, trades};
use crate::{
    db_types::{NewTrade, PaymentRequest, PaymentStatus, Trade, TradeId, TradeStatus},
    helpers::PhoneNumber,
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub async fn new(max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    /// An in-memory database for tests. A single connection, so that every handle sees the same data.
    pub async fn new_in_memory() -> Result<Self, PaymentGatewayError> {
        Self::new_with_url("sqlite::memory:", 1).await
    }
}

#[async_trait]
impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_trade_with_request(
        &self,
        trade: NewTrade,
        payer: PhoneNumber,
        push_amount: Cents,
    ) -> Result<(Trade, PaymentRequest), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let trade = trades::insert(trade, &mut tx).await?;
        let request = payment_requests::insert(&trade.trade_id, 1, payer, push_amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Trade {} saved with payment request #{} ({})", trade.trade_id, request.id, request.amount);
        Ok((trade, request))
    }

    async fn fetch_trade(&self, trade_id: &TradeId) -> Result<Option<Trade>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        trades::fetch_trade(trade_id, &mut conn).await
    }

    async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payment_requests::fetch_by_id(id, &mut conn).await
    }

    async fn fetch_payment_request_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payment_requests::fetch_by_checkout_id(checkout_request_id, &mut conn).await
    }

    async fn fetch_active_request_for_trade(
        &self,
        trade_id: &TradeId,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payment_requests::fetch_active_for_trade(trade_id, &mut conn).await
    }

    async fn set_correlation_ids(
        &self,
        request_id: i64,
        merchant_request_id: &str,
        checkout_request_id: &str,
    ) -> Result<PaymentRequest, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payment_requests::set_correlation_ids(request_id, merchant_request_id, checkout_request_id, &mut conn)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::CorrelationUpdateError(format!(
                    "Payment request #{request_id} is not awaiting correlation ids"
                ))
            })
    }

    async fn mark_trade_simulated(&self, trade_id: &TradeId) -> Result<Trade, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        trades::mark_simulated(trade_id, &mut conn).await
    }

    async fn claim_payment_event(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payment_requests::claim(checkout_request_id, &mut conn).await
    }

    async fn confirm_payment(
        &self,
        checkout_request_id: &str,
        receipt_number: Option<&str>,
        result_code: i64,
        result_desc: &str,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = payment_requests::finalize(
            checkout_request_id,
            PaymentStatus::Confirmed,
            receipt_number,
            Some(result_code),
            result_desc,
            &mut tx,
        )
        .await?
        .ok_or_else(|| {
            PaymentGatewayError::PaymentStatusUpdateError(format!(
                "Payment request for {checkout_request_id} is already terminal"
            ))
        })?;
        let trade = trades::transition_status(&request.trade_id, TradeStatus::Pending, TradeStatus::Paid, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::PaymentStatusUpdateError(format!(
                    "Trade {} is not pending; cannot mark it paid",
                    request.trade_id
                ))
            })?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment request #{} confirmed (receipt: {}). Trade {} paid.",
            request.id,
            receipt_number.unwrap_or("none"),
            trade.trade_id
        );
        Ok((request, trade))
    }

    async fn fail_payment(
        &self,
        checkout_request_id: &str,
        result_code: Option<i64>,
        result_desc: &str,
        fail_trade: bool,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request =
            payment_requests::finalize(checkout_request_id, PaymentStatus::Failed, None, result_code, result_desc, &mut tx)
                .await?
                .ok_or_else(|| {
                    PaymentGatewayError::PaymentStatusUpdateError(format!(
                        "Payment request for {checkout_request_id} is already terminal"
                    ))
                })?;
        let trade = if fail_trade {
            trades::transition_status(&request.trade_id, TradeStatus::Pending, TradeStatus::Failed, &mut tx)
                .await?
                .ok_or_else(|| {
                    PaymentGatewayError::PaymentStatusUpdateError(format!(
                        "Trade {} is not pending; cannot mark it failed",
                        request.trade_id
                    ))
                })?
        } else {
            trades::fetch_trade(&request.trade_id, &mut tx)
                .await?
                .ok_or_else(|| PaymentGatewayError::TradeNotFound(request.trade_id.clone()))?
        };
        tx.commit().await?;
        debug!("🗃️ Payment request #{} failed: {result_desc}", request.id);
        Ok((request, trade))
    }

    async fn abort_initiated_request(
        &self,
        trade_id: &TradeId,
        result_desc: &str,
        fail_trade: bool,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = payment_requests::fail_initiated_for_trade(trade_id, result_desc, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::PaymentStatusUpdateError(format!(
                    "Trade {trade_id} has no payment request awaiting initiation"
                ))
            })?;
        let trade = if fail_trade {
            trades::transition_status(trade_id, TradeStatus::Pending, TradeStatus::Failed, &mut tx)
                .await?
                .ok_or_else(|| {
                    PaymentGatewayError::PaymentStatusUpdateError(format!(
                        "Trade {trade_id} is not pending; cannot mark it failed"
                    ))
                })?
        } else {
            trades::fetch_trade(trade_id, &mut tx)
                .await?
                .ok_or_else(|| PaymentGatewayError::TradeNotFound(trade_id.clone()))?
        };
        tx.commit().await?;
        warn!("🗃️ Payment request #{} aborted before initiation completed: {result_desc}", request.id);
        Ok((request, trade))
    }

    async fn cancel_trade(&self, trade_id: &TradeId) -> Result<(Trade, PaymentRequest), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = payment_requests::fail_initiated_for_trade(trade_id, "Cancelled by user", &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::CancellationForbidden(format!(
                    "Trade {trade_id} has no payment request still awaiting authorisation"
                ))
            })?;
        let trade = trades::transition_status(trade_id, TradeStatus::Pending, TradeStatus::Cancelled, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::CancellationForbidden(format!("Trade {trade_id} is no longer pending"))
            })?;
        tx.commit().await?;
        info!("🗃️ Trade {trade_id} cancelled");
        Ok((trade, request))
    }

    async fn create_retry_attempt(
        &self,
        trade_id: &TradeId,
        payer: PhoneNumber,
        push_amount: Cents,
    ) -> Result<PaymentRequest, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let trade = trades::fetch_trade(trade_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::TradeNotFound(trade_id.clone()))?;
        if trade.status != TradeStatus::Pending {
            return Err(PaymentGatewayError::RetryForbidden(format!("Trade {trade_id} is {}", trade.status)));
        }
        if let Some(active) = payment_requests::fetch_active_for_trade(trade_id, &mut tx).await? {
            return Err(PaymentGatewayError::RetryForbidden(format!(
                "Payment request #{} for trade {trade_id} is still {}",
                active.id, active.status
            )));
        }
        let attempt = payment_requests::next_attempt_number(trade_id, &mut tx).await?;
        let request = payment_requests::insert(trade_id, attempt, payer, push_amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Created payment attempt #{attempt} for trade {trade_id}");
        Ok(request)
    }

    async fn expire_stale_requests(&self, window: Duration) -> Result<Vec<PaymentRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let expired = payment_requests::expire_stale(window.num_seconds(), &mut conn).await?;
        if !expired.is_empty() {
            info!("🗃️ {} payment request(s) timed out", expired.len());
        }
        Ok(expired)
    }
}
