//! Visit repository trait (port)

use async_trait::async_trait;

use crate::domain::{BusinessKey, Customer, CustomerKey, NewVisit, RewardClaim, VisitEvent};
use crate::error::DomainError;

/// Outcome of an atomic visit write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitWrite {
    /// Count incremented and event appended. `claim` is the pending claim for
    /// a completed cycle, or the one already stored for that cycle.
    Recorded { event: VisitEvent, claim: Option<RewardClaim> },
    /// The visit closed a cycle but its claim token belongs to another claim.
    /// Nothing was written; retry with a fresh token.
    TokenTaken,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Increments the customer's visit count by one, appends the matching
    /// event and inserts the cycle's pending claim when the new count is a
    /// multiple of the goal. Either all of it is written or none of it.
    /// `None` when the customer does not exist in that business.
    async fn record_visit(&self, visit: &NewVisit) -> Result<Option<VisitWrite>, DomainError>;

    /// Inserts `customer` (with a zero count) and records its first visit as
    /// one atomic operation. A duplicate phone number in the same business
    /// yields `CustomerAlreadyExists` and writes nothing.
    async fn register_with_visit(&self, customer: &Customer, visit: &NewVisit) -> Result<VisitWrite, DomainError>;

    /// Most recent events first.
    async fn recent_visits(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        limit: i64,
    ) -> Result<Vec<VisitEvent>, DomainError>;
}
