//! PostgreSQL repository implementations

pub mod business_repo_impl;
pub mod customer_repo_impl;
pub mod visit_repo_impl;
pub mod reward_claim_repo_impl;
pub mod campaign_repo_impl;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use loyalty_core::error::DomainError;
use loyalty_core::repositories::StorageHealth;

pub use business_repo_impl::PgBusinessRepository;
pub use customer_repo_impl::PgCustomerRepository;
pub use visit_repo_impl::PgVisitRepository;
pub use reward_claim_repo_impl::PgRewardClaimRepository;
pub use campaign_repo_impl::PgCampaignRepository;

/// Logs and converts a driver error. Every sqlx failure is reported as the
/// store being unavailable; constraint violations are mapped by the caller.
pub(crate) fn storage_error(context: &str, e: sqlx::Error) -> DomainError {
    error!("Database error {}: {}", context, e);
    DomainError::StorageUnavailable(format!("{}: {}", context, e))
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|db| db.is_unique_violation())
}

pub struct PgStorageHealth {
    pool: PgPool,
}

impl PgStorageHealth {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageHealth for PgStorageHealth {
    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| storage_error("pinging database", e))
    }
}
