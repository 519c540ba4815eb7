use thiserror::Error;

#[derive(Debug, Error)]
pub enum DarajaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not obtain an access token: {0}")]
    AuthenticationFailed(String),
    #[error("The Daraja API could not be reached: {0}")]
    Unavailable(String),
    #[error("Invalid response from the Daraja API: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Daraja rejected the request. Code {code}. {message}")]
    Rejected { code: String, message: String },
    #[error("The transaction is still being processed")]
    TransactionInProgress,
}
