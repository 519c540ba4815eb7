use async_trait::async_trait;
use daraja_tools::{DarajaApi, DarajaApiError, DarajaConfig};
use log::*;
use umeme_payment_engine::traits::{
    PaymentProvider,
    PaymentProviderError,
    ProviderStatusResult,
    PushInit,
    PushRequest,
};

use crate::errors::ServerError;

/// The live M-Pesa gateway, adapted to the engine's [`PaymentProvider`] capability.
#[derive(Clone)]
pub struct DarajaProvider {
    api: DarajaApi,
}

impl DarajaProvider {
    pub fn new(config: DarajaConfig) -> Result<Self, ServerError> {
        let api = DarajaApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

#[async_trait]
impl PaymentProvider for DarajaProvider {
    async fn initiate(&self, request: PushRequest) -> Result<PushInit, PaymentProviderError> {
        // The flow API already rounds, so this is normally a no-op; an amount that cannot round is a caller bug.
        let amount =
            request.amount.round_up_to_shilling().map_err(|e| PaymentProviderError::Validation(e.to_string()))?;
        let push = self
            .api
            .stk_push(request.phone.as_str(), amount, &request.reference, &request.description)
            .await
            .map_err(to_provider_error)?;
        Ok(PushInit {
            merchant_request_id: push.merchant_request_id,
            checkout_request_id: push.checkout_request_id,
            customer_message: (!push.customer_message.is_empty()).then_some(push.customer_message),
        })
    }

    async fn query_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<ProviderStatusResult>, PaymentProviderError> {
        match self.api.stk_query(checkout_request_id).await {
            Ok(response) => {
                let result_code = response.result_code.parse::<i64>().map_err(|_| {
                    PaymentProviderError::Validation(format!(
                        "Daraja returned a non-numeric result code: {}",
                        response.result_code
                    ))
                })?;
                // The query response carries neither a receipt nor the settled amount; only the callback does.
                Ok(Some(ProviderStatusResult {
                    result_code,
                    result_desc: response.result_desc,
                    receipt_number: None,
                    amount: None,
                }))
            },
            Err(DarajaApiError::TransactionInProgress) => {
                trace!("🏦️ {checkout_request_id} is still waiting for the payer");
                Ok(None)
            },
            Err(e) => Err(to_provider_error(e)),
        }
    }
}

fn to_provider_error(e: DarajaApiError) -> PaymentProviderError {
    match e {
        DarajaApiError::AuthenticationFailed(s) => PaymentProviderError::Auth(s),
        DarajaApiError::Rejected { code, message } => PaymentProviderError::Rejected { code, message },
        e => PaymentProviderError::Unavailable(e.to_string()),
    }
}
