//! Outbound collaborator ports: message transports and QR rendering

use async_trait::async_trait;
use thiserror::Error;

use crate::error::DomainError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Recipient rejected: {0}")]
    Rejected(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Send timed out")]
    Timeout,
}

impl From<TransportError> for DomainError {
    fn from(e: TransportError) -> Self {
        DomainError::TransportFailure(e.to_string())
    }
}

/// Phone-based messaging (WhatsApp/SMS).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhoneMessenger: Send + Sync {
    async fn send_phone_message(&self, phone: &str, text: &str) -> Result<(), TransportError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, address: &str, subject: &str, html: &str) -> Result<(), TransportError>;
}

/// Maps arbitrary text to a displayable QR image URL.
pub trait QrRenderer: Send + Sync {
    fn image_url(&self, text: &str) -> String;
}
