//! Error types for the flow generator

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flow generator
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    // Gateway errors
    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Gateway timeout after {0}ms")]
    Timeout(u64),

    #[error("Gateway returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        transaction_id: Option<String>,
    },

    #[error("Missing transaction id in {0} response")]
    MissingTransactionId(String),

    #[error("Missing checkout URL in initialize response for transaction {0}")]
    MissingCheckoutUrl(String),

    // Flow outcome errors
    #[error("Authorization declined unexpectedly: {message}")]
    UnexpectedDecline {
        transaction_id: Option<String>,
        message: String,
    },

    #[error("Decline flow was authorized: {transaction_id}")]
    UnexpectedAuthorization { transaction_id: String },

    #[error("Step {step} failed: {source}")]
    Step {
        step: String,
        transaction_id: String,
        #[source]
        source: Box<Error>,
    },

    // Checkout errors
    #[error("Checkout failed: {0}")]
    Checkout(String),

    #[error("Final URL validation failed. Actual URL: {url}")]
    RedirectMismatch { url: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is a transport-level failure worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::Status { .. } | Error::Deserialization(_)
        )
    }

    /// Best-known transaction id carried by this error, if any
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Error::Status { transaction_id, .. } | Error::UnexpectedDecline { transaction_id, .. } => {
                transaction_id.as_deref()
            }
            Error::UnexpectedAuthorization { transaction_id }
            | Error::MissingCheckoutUrl(transaction_id) => Some(transaction_id),
            Error::Step {
                transaction_id,
                source,
                ..
            } => source.transaction_id().or(Some(transaction_id)),
            _ => None,
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
