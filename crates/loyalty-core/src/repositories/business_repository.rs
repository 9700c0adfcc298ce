//! Business repository trait (port)

use async_trait::async_trait;

use crate::domain::{Business, BusinessKey};
use crate::error::DomainError;

/// Tenant records are owned by an external collaborator; the engine only reads them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn find_by_key(&self, key: &BusinessKey) -> Result<Option<Business>, DomainError>;
}
