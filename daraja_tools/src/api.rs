use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::*;
use reqwest::{header::HeaderValue, Client, StatusCode};
use upg_common::Cents;

use crate::{
    config::DarajaConfig,
    data_objects::{DarajaErrorResponse, StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse},
    helpers::{basic_auth, daraja_timestamp, stk_password},
    token::{TokenManager, TokenResponse, TokenSource},
    DarajaApiError,
};

// The Daraja error code for "the STK prompt has not been answered yet"
const IN_PROGRESS_ERROR_CODE: &str = "500.001.1001";

#[derive(Clone)]
pub struct DarajaApi {
    config: DarajaConfig,
    client: Arc<Client>,
    tokens: TokenManager,
}

impl DarajaApi {
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaApiError> {
        let client = Client::builder().build().map_err(|e| DarajaApiError::Initialization(e.to_string()))?;
        info!("🏦️ Daraja API client initialised for the {} environment", config.environment);
        Ok(Self { config, client: Arc::new(client), tokens: TokenManager::new() })
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.environment.base_url())
    }

    /// Initiates an STK push: the payer's handset is prompted to authorise `amount` against our shortcode.
    ///
    /// `amount` must already be a whole-shilling value (see `Cents::round_up_to_shilling`); Daraja does not take
    /// fractional amounts. A `ResponseCode` other than "0" is returned as [`DarajaApiError::Rejected`].
    pub async fn stk_push(
        &self,
        phone: &str,
        amount: Cents,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse, DarajaApiError> {
        let token = self.tokens.access_token(self).await?;
        let timestamp = daraja_timestamp(Utc::now());
        let payload = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: amount.whole_shillings(),
            party_a: phone.to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone.to_string(),
            call_back_url: self.config.callback_url.clone(),
            account_reference: account_reference.to_string(),
            transaction_desc: transaction_desc.to_string(),
        };
        debug!("🏦️ Initiating STK push of {amount} to {phone} (ref {account_reference})");
        let response = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DarajaApiError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(self.map_failure_status(response).await);
        }
        let push: StkPushResponse =
            response.json().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))?;
        if push.response_code != "0" {
            return Err(DarajaApiError::Rejected { code: push.response_code, message: push.response_description });
        }
        info!("🏦️ STK push accepted. CheckoutRequestID {}", push.checkout_request_id);
        Ok(push)
    }

    /// Queries the outcome of an earlier STK push by its `CheckoutRequestID`.
    ///
    /// Returns [`DarajaApiError::TransactionInProgress`] while the payer has not yet responded to the prompt.
    pub async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse, DarajaApiError> {
        let token = self.tokens.access_token(self).await?;
        let timestamp = daraja_timestamp(Utc::now());
        let payload = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        trace!("🏦️ Querying STK push status for {checkout_request_id}");
        let response = self
            .client
            .post(self.url("/mpesa/stkpushquery/v1/query"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DarajaApiError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(self.map_failure_status(response).await);
        }
        response.json().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))
    }

    async fn map_failure_status(&self, response: reqwest::Response) -> DarajaApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if let Ok(err) = serde_json::from_str::<DarajaErrorResponse>(&body) {
            if err.error_code == IN_PROGRESS_ERROR_CODE {
                return DarajaApiError::TransactionInProgress;
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return DarajaApiError::AuthenticationFailed(err.error_message);
            }
            return DarajaApiError::Rejected { code: err.error_code, message: err.error_message };
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            DarajaApiError::AuthenticationFailed(format!("HTTP {status}"))
        } else {
            DarajaApiError::Unavailable(format!("HTTP {status}: {body}"))
        }
    }
}

#[async_trait]
impl TokenSource for DarajaApi {
    async fn fetch_token(&self) -> Result<TokenResponse, DarajaApiError> {
        let auth = basic_auth(&self.config.consumer_key, &self.config.consumer_secret);
        let auth = HeaderValue::from_str(&auth).map_err(|e| DarajaApiError::AuthenticationFailed(e.to_string()))?;
        let response = self
            .client
            .get(self.url("/oauth/v1/generate?grant_type=client_credentials"))
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| DarajaApiError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DarajaApiError::AuthenticationFailed(format!("HTTP {status}: {body}")));
        }
        response.json().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))
    }
}
