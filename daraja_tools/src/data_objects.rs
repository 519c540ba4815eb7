//! Wire types for the Daraja STK push endpoints.
//!
//! Field names follow Daraja's PascalCase JSON exactly; keep the serde renames in sync with
//! <https://developer.safaricom.co.ke/APIs/MpesaExpressSimulate>.

use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------   STK push request   --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    /// Whole shillings. Daraja does not accept fractional amounts.
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

//--------------------------------------   STK status query   --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    /// "0" for a completed, successful payment. Any other value is an explicit decline or failure.
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
}

/// The error body Daraja returns while a transaction has not settled yet, or when a request is malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct DarajaErrorResponse {
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    #[serde(rename = "errorCode", default)]
    pub error_code: String,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

//--------------------------------------   Callback envelope   -------------------------------------------------------
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub item: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

impl StkCallback {
    fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata.as_ref()?.item.iter().find(|i| i.name == name).map(|i| &i.value)
    }

    /// The settled amount in shillings, present on successful callbacks only.
    pub fn amount(&self) -> Option<f64> {
        self.metadata_value("Amount")?.as_f64()
    }

    /// The M-Pesa receipt number, e.g. "NLJ7RT61SV". Present on successful callbacks only.
    pub fn receipt_number(&self) -> Option<String> {
        self.metadata_value("MpesaReceiptNumber")?.as_str().map(String::from)
    }

    pub fn phone_number(&self) -> Option<String> {
        let value = self.metadata_value("PhoneNumber")?;
        // The sandbox sends the MSISDN as a JSON number, production as a string
        value.as_str().map(String::from).or_else(|| value.as_i64().map(|n| n.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SUCCESS_CALLBACK: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 30.00 },
                        { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                        { "Name": "TransactionDate", "Value": 20191219102115 },
                        { "Name": "PhoneNumber", "Value": 254708374149 }
                    ]
                }
            }
        }
    }"#;

    const DECLINED_CALLBACK: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user."
            }
        }
    }"#;

    #[test]
    fn parse_success_callback() {
        let envelope: CallbackEnvelope = serde_json::from_str(SUCCESS_CALLBACK).unwrap();
        let cb = envelope.body.stk_callback;
        assert_eq!(cb.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(cb.result_code, 0);
        assert_eq!(cb.amount(), Some(30.0));
        assert_eq!(cb.receipt_number().as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(cb.phone_number().as_deref(), Some("254708374149"));
    }

    #[test]
    fn parse_declined_callback() {
        let envelope: CallbackEnvelope = serde_json::from_str(DECLINED_CALLBACK).unwrap();
        let cb = envelope.body.stk_callback;
        assert_eq!(cb.result_code, 1032);
        assert!(cb.amount().is_none());
        assert!(cb.receipt_number().is_none());
    }

    #[test]
    fn push_request_uses_daraja_field_names() {
        let req = StkPushRequest {
            business_short_code: "174379".into(),
            password: "cGFzcw==".into(),
            timestamp: "20240101120000".into(),
            transaction_type: "CustomerPayBillOnline".into(),
            amount: 30,
            party_a: "254708374149".into(),
            party_b: "174379".into(),
            phone_number: "254708374149".into(),
            call_back_url: "https://example.com/callback".into(),
            account_reference: "ENERGY_TRD-1".into(),
            transaction_desc: "Energy purchase".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["Amount"], 30);
        assert_eq!(json["CallBackURL"], "https://example.com/callback");
    }
}
