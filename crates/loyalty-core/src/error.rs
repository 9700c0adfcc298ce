//! Domain errors

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Business not found: {0}")]
    BusinessNotFound(String),

    #[error("Claim not found")]
    ClaimNotFound,

    #[error("Reward already claimed at {claimed_at}")]
    AlreadyClaimed { claimed_at: DateTime<Utc> },

    #[error("Customer already exists in business {business_key}: {detail}")]
    CustomerAlreadyExists { business_key: String, detail: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Every candidate was contacted within the rate-limit window")]
    AllRateLimited,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Unable to generate a unique claim token after {attempts} attempts")]
    TokenSpaceExhausted { attempts: u32 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage timed out during {0}")]
    StorageTimeout(String),
}

impl DomainError {
    /// Whether a caller may safely retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::StorageUnavailable(_) | DomainError::StorageTimeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::CustomerNotFound(_) | DomainError::BusinessNotFound(_) | DomainError::ClaimNotFound
        )
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(errors.to_string())
    }
}
