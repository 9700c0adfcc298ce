//! Customer repository trait (port)
//!
//! Customers are created together with their first visit, see
//! [`VisitRepository::register_with_visit`](super::VisitRepository::register_with_visit).

use async_trait::async_trait;

use crate::domain::{BusinessKey, Customer, CustomerKey};
use crate::error::DomainError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find(&self, business: &BusinessKey, key: &CustomerKey) -> Result<Option<Customer>, DomainError>;
}
