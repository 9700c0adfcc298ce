// ============================================================================
// Loyalty Infrastructure - PostgreSQL Customer Repository
// File: crates/loyalty-infrastructure/src/database/postgres/customer_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, warn};

use loyalty_core::domain::{BusinessKey, Customer, CustomerKey};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::CustomerRepository;

use super::{is_unique_violation, storage_error};

pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    pub customer_key: String,
    pub business_key: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub visit_count: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            key: CustomerKey::new(row.customer_key),
            business_key: BusinessKey::new(row.business_key),
            display_name: row.display_name,
            phone: row.phone,
            email: row.email,
            visit_count: row.visit_count,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn find(&self, business: &BusinessKey, key: &CustomerKey) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT customer_key, business_key, display_name, phone, email,
                   visit_count, created_at, modified_at
            FROM customers
            WHERE business_key = $1 AND customer_key = $2
            "#,
        )
        .bind(business.as_str())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("finding customer", e))?;

        Ok(row.map(|r| r.into()))
    }
}

/// Inserts a new customer on `conn`; registration runs it inside the same
/// transaction as the first visit. A phone number already registered in the
/// business violates the store's unique constraint.
pub(crate) async fn insert_customer(conn: &mut PgConnection, customer: &Customer) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO customers (
            customer_key, business_key, display_name, phone, email,
            visit_count, created_at, modified_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(customer.key.as_str())
    .bind(customer.business_key.as_str())
    .bind(&customer.display_name)
    .bind(&customer.phone)
    .bind(&customer.email)
    .bind(customer.visit_count)
    .bind(customer.created_at)
    .bind(customer.modified_at)
    .execute(&mut *conn)
    .await
    .map_err(|e: sqlx::Error| {
        if is_unique_violation(&e) {
            warn!("Duplicate customer in business {}: {}", customer.business_key, e);
            DomainError::CustomerAlreadyExists {
                business_key: customer.business_key.to_string(),
                detail: "phone number already registered".to_string(),
            }
        } else {
            storage_error("creating customer", e)
        }
    })?;

    debug!("Customer row inserted: {}", customer.key);
    Ok(())
}
