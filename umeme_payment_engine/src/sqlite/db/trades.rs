use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTrade, Trade, TradeId, TradeStatus},
    traits::PaymentGatewayError,
};

pub async fn insert(trade: NewTrade, conn: &mut SqliteConnection) -> Result<Trade, PaymentGatewayError> {
    let trade_id = trade.trade_id.clone();
    let trade = sqlx::query_as(
        r#"
            INSERT INTO trades (trade_id, direction, energy_wh, unit_price, total, buyer_phone, seller_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(trade.trade_id)
    .bind(trade.direction.to_string())
    .bind(trade.energy)
    .bind(trade.unit_price)
    .bind(trade.total)
    .bind(trade.buyer_phone)
    .bind(trade.seller_phone)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            PaymentGatewayError::DatabaseError(format!("Trade {trade_id} already exists"))
        },
        _ => PaymentGatewayError::from(e),
    })?;
    Ok(trade)
}

pub async fn fetch_trade(trade_id: &TradeId, conn: &mut SqliteConnection) -> Result<Option<Trade>, PaymentGatewayError> {
    let trade = sqlx::query_as("SELECT * FROM trades WHERE trade_id = $1")
        .bind(trade_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(trade)
}

pub async fn mark_simulated(trade_id: &TradeId, conn: &mut SqliteConnection) -> Result<Trade, PaymentGatewayError> {
    let trade = sqlx::query_as(
        "UPDATE trades SET simulated = 1, updated_at = CURRENT_TIMESTAMP WHERE trade_id = $1 RETURNING *",
    )
    .bind(trade_id.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| PaymentGatewayError::TradeNotFound(trade_id.clone()))?;
    Ok(trade)
}

/// Moves a trade from `from` to `to` if and only if it is still in `from`. Returns `None` when the precondition does
/// not hold -- this is what makes trade transitions monotonic under concurrency.
pub async fn transition_status(
    trade_id: &TradeId,
    from: TradeStatus,
    to: TradeStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Trade>, PaymentGatewayError> {
    let trade = sqlx::query_as(
        "UPDATE trades SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE trade_id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(trade_id.as_str())
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(trade)
}
