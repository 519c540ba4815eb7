use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;
use upg_common::Cents;

use crate::{
    db_types::{NewTrade, PaymentRequest, Trade, TradeId},
    helpers::PhoneNumber,
};

/// The persistence contract for the payment engine.
///
/// Implementations must guarantee:
/// * [`create_trade_with_request`] is atomic: trade and payment request are committed together or not at all.
/// * Every status transition uses a status precondition on the row it updates, so that transitions for a given
///   trade or payment request serialise without any process-wide lock.
#[async_trait]
pub trait PaymentGatewayDatabase: Clone + Send + Sync {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Atomically stores a new trade (status `Pending`) together with its first payment request (status `Initiated`).
    /// `push_amount` is the amount the provider will be asked to collect.
    async fn create_trade_with_request(
        &self,
        trade: NewTrade,
        payer: PhoneNumber,
        push_amount: Cents,
    ) -> Result<(Trade, PaymentRequest), PaymentGatewayError>;

    async fn fetch_trade(&self, trade_id: &TradeId) -> Result<Option<Trade>, PaymentGatewayError>;

    async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, PaymentGatewayError>;

    async fn fetch_payment_request_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError>;

    /// The single non-terminal payment request for the trade, if any.
    async fn fetch_active_request_for_trade(
        &self,
        trade_id: &TradeId,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError>;

    /// Stores the provider correlation pair on a freshly initiated request.
    async fn set_correlation_ids(
        &self,
        request_id: i64,
        merchant_request_id: &str,
        checkout_request_id: &str,
    ) -> Result<PaymentRequest, PaymentGatewayError>;

    /// Flags the trade as settling through the simulated provider.
    async fn mark_trade_simulated(&self, trade_id: &TradeId) -> Result<Trade, PaymentGatewayError>;

    /// Claims an incoming payment event for reconciliation: moves the request from `Initiated` to `CallbackReceived`
    /// if and only if it is still `Initiated`. Returns `None` when the precondition fails (already claimed, or
    /// already terminal) -- concurrent callbacks and polls for the same correlation id race on exactly this update,
    /// and only one of them wins.
    async fn claim_payment_event(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentRequest>, PaymentGatewayError>;

    /// Finalises a claimed request as `Confirmed` and, in the same transaction, marks the owning trade `Paid`.
    /// `receipt_number` is `None` for poll-confirmed payments, since the status query carries no receipt.
    async fn confirm_payment(
        &self,
        checkout_request_id: &str,
        receipt_number: Option<&str>,
        result_code: i64,
        result_desc: &str,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError>;

    /// Finalises a claimed (or still initiated) request as `Failed`. When `fail_trade` is set the owning trade is
    /// marked `Failed` in the same transaction; otherwise the trade is left `Pending` for a retry.
    async fn fail_payment(
        &self,
        checkout_request_id: &str,
        result_code: Option<i64>,
        result_desc: &str,
        fail_trade: bool,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError>;

    /// Fails a payment request that never received its correlation ids, i.e. the initiate call itself was rejected.
    /// When `fail_trade` is set the owning trade is marked `Failed` too.
    async fn abort_initiated_request(
        &self,
        trade_id: &TradeId,
        result_desc: &str,
        fail_trade: bool,
    ) -> Result<(PaymentRequest, Trade), PaymentGatewayError>;

    /// Cancels a trade. Only permitted while its payment request is still `Initiated`; the request is failed with a
    /// cancellation note and the trade moves to `Cancelled` atomically.
    async fn cancel_trade(&self, trade_id: &TradeId) -> Result<(Trade, PaymentRequest), PaymentGatewayError>;

    /// Creates payment attempt n+1 for a trade whose previous attempt reached a terminal status. Fails with
    /// [`PaymentGatewayError::RetryForbidden`] if the trade is not `Pending` or a non-terminal attempt still exists.
    async fn create_retry_attempt(
        &self,
        trade_id: &TradeId,
        payer: PhoneNumber,
        push_amount: Cents,
    ) -> Result<PaymentRequest, PaymentGatewayError>;

    /// Marks every request older than `window` that is still awaiting an answer as `Timeout`. Returns the requests
    /// that were expired. The owning trades stay `Pending`; "no answer" is retryable, unlike an explicit decline.
    /// A claimed (`CallbackReceived`) request is measured from its last update rather than its creation, so an
    /// in-flight reconciliation is not swept away under the reconciler.
    async fn expire_stale_requests(&self, window: Duration) -> Result<Vec<PaymentRequest>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Invalid trade parameters: {0}")]
    ValidationError(String),
    #[error("The requested trade {0} does not exist")]
    TradeNotFound(TradeId),
    #[error("The requested payment request does not exist: {0}")]
    PaymentRequestNotFound(String),
    #[error("Cannot store correlation ids: {0}")]
    CorrelationUpdateError(String),
    #[error("Illegal payment status change. {0}")]
    PaymentStatusUpdateError(String),
    #[error("The trade can no longer be cancelled: {0}")]
    CancellationForbidden(String),
    #[error("A new payment attempt is not permitted: {0}")]
    RetryForbidden(String),
    #[error("Callback amount {got} does not match the requested amount {want}")]
    AmountMismatch { want: Cents, got: Cents },
    #[error("Conflicting callback for {0}: the stored outcome remains authoritative")]
    CallbackConflict(String),
    #[error("The payment provider failed: {0}")]
    ProviderError(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
