use sqlx::SqliteConnection;
use upg_common::Cents;

use crate::{
    db_types::{PaymentRequest, PaymentStatus, TradeId},
    helpers::PhoneNumber,
    traits::PaymentGatewayError,
};

pub async fn insert(
    trade_id: &TradeId,
    attempt: i64,
    phone: PhoneNumber,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<PaymentRequest, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
            INSERT INTO payment_requests (trade_id, attempt, phone, amount) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(trade_id.as_str())
    .bind(attempt)
    .bind(phone)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    Ok(request)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as("SELECT * FROM payment_requests WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(request)
}

pub async fn fetch_by_checkout_id(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as("SELECT * FROM payment_requests WHERE checkout_request_id = $1")
        .bind(checkout_request_id)
        .fetch_optional(conn)
        .await?;
    Ok(request)
}

pub async fn fetch_active_for_trade(
    trade_id: &TradeId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as(
        "SELECT * FROM payment_requests WHERE trade_id = $1 AND status IN ('Initiated', 'CallbackReceived')",
    )
    .bind(trade_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn set_correlation_ids(
    request_id: i64,
    merchant_request_id: &str,
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
            UPDATE payment_requests
            SET merchant_request_id = $1, checkout_request_id = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'Initiated'
            RETURNING *;
        "#,
    )
    .bind(merchant_request_id)
    .bind(checkout_request_id)
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// The claim that serialises reconciliation: `Initiated` -> `CallbackReceived`, only if still `Initiated`.
pub async fn claim(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
            UPDATE payment_requests SET status = 'CallbackReceived', updated_at = CURRENT_TIMESTAMP
            WHERE checkout_request_id = $1 AND status = 'Initiated'
            RETURNING *;
        "#,
    )
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// Finalises a non-terminal request into `status` (a terminal one), recording the provider's verdict.
pub async fn finalize(
    checkout_request_id: &str,
    status: PaymentStatus,
    receipt_number: Option<&str>,
    result_code: Option<i64>,
    result_desc: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
            UPDATE payment_requests
            SET status = $1, receipt_number = $2, result_code = $3, result_desc = $4, updated_at = CURRENT_TIMESTAMP
            WHERE checkout_request_id = $5 AND status IN ('Initiated', 'CallbackReceived')
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(receipt_number)
    .bind(result_code)
    .bind(result_desc)
    .bind(checkout_request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

/// Fails the still-`Initiated` request of a trade being cancelled. The status precondition is what forbids
/// cancellation once a callback has been claimed or the payment confirmed.
pub async fn fail_initiated_for_trade(
    trade_id: &TradeId,
    result_desc: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
            UPDATE payment_requests
            SET status = 'Failed', result_desc = $1, updated_at = CURRENT_TIMESTAMP
            WHERE trade_id = $2 AND status = 'Initiated'
            RETURNING *;
        "#,
    )
    .bind(result_desc)
    .bind(trade_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn next_attempt_number(trade_id: &TradeId, conn: &mut SqliteConnection) -> Result<i64, PaymentGatewayError> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(attempt) FROM payment_requests WHERE trade_id = $1")
        .bind(trade_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

/// Times out every request that has been waiting for an answer longer than `window_seconds`.
///
/// An `Initiated` request ages from its creation. A `CallbackReceived` one ages from its last update, so a claim
/// taken just before the sweep runs is not yanked out from under the reconciler.
pub async fn expire_stale(
    window_seconds: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRequest>, PaymentGatewayError> {
    let requests = sqlx::query_as(
        r#"
            UPDATE payment_requests
            SET status = 'Timeout', result_desc = 'No provider response within the timeout window',
                updated_at = CURRENT_TIMESTAMP
            WHERE (status = 'Initiated' AND created_at <= datetime('now', '-' || $1 || ' seconds'))
               OR (status = 'CallbackReceived' AND updated_at <= datetime('now', '-' || $1 || ' seconds'))
            RETURNING *;
        "#,
    )
    .bind(window_seconds)
    .fetch_all(conn)
    .await?;
    Ok(requests)
}
