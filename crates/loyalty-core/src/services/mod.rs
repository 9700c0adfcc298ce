//! Domain services (business logic)

pub mod identity_resolver;
pub mod customer_service;
pub mod visit_ledger;
pub mod token_issuer;
pub mod reward_cycle;
pub mod message_renderer;
pub mod campaign_dispatcher;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DomainError;

pub use identity_resolver::IdentityResolver;
pub use customer_service::{CustomerOverview, CustomerService, Registration};
pub use visit_ledger::VisitLedger;
pub use token_issuer::{ClaimTokenGenerator, RandomDigitTokens, TokenIssuer, TokenIssuerSettings};
pub use reward_cycle::RewardCycleEngine;
pub use message_renderer::{MessageContext, MessageRenderer};
pub use campaign_dispatcher::{CampaignDispatcher, DispatchSettings};

/// Bounds one storage call. Elapsing yields the retryable `StorageTimeout`;
/// the caller must treat the operation as not having happened.
pub(crate) async fn with_storage_timeout<T, F>(limit: Duration, op: &str, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Storage call {} exceeded {:?}", op, limit);
            Err(DomainError::StorageTimeout(op.to_string()))
        }
    }
}
