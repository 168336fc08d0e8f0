use thiserror::Error;

use crate::storage::StorageError;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON serialization error: {}", err))
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Missing fields: {0}")]
    MissingFields(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid signature for {0}")]
    InvalidSignature(String),

    #[error("Consent not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Revoke signer mismatch for consent {consent_id}")]
    SignerMismatch { consent_id: String },

    #[error("Chain integrity violation at block {index}: {reason}")]
    Integrity { index: u64, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

impl LedgerError {
    pub fn missing_fields(what: &str) -> Self {
        Self::MissingFields(what.to_string())
    }

    pub fn invalid_encoding(field: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidEncoding(format!("{}: {}", field, err))
    }

    /// True for errors raised before any state was touched because the request
    /// itself was malformed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFields(_) | Self::Validation(_) | Self::InvalidEncoding(_)
        )
    }
}
