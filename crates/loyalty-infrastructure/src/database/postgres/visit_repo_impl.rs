// ============================================================================
// Loyalty Infrastructure - PostgreSQL Visit Repository
// File: crates/loyalty-infrastructure/src/database/postgres/visit_repo_impl.rs
// Description: Visit count, visit events and cycle claims in one transaction
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use loyalty_core::domain::{BusinessKey, Customer, CustomerKey, NewVisit, VisitEvent};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::{ClaimInsert, VisitRepository, VisitWrite};

use super::customer_repo_impl::insert_customer;
use super::reward_claim_repo_impl::insert_claim;
use super::storage_error;

pub struct PgVisitRepository {
    pool: PgPool,
}

impl PgVisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct VisitEventRow {
    pub id: Uuid,
    pub customer_key: String,
    pub business_key: String,
    pub recorded_at: DateTime<Utc>,
    pub resulting_count: i64,
}

impl From<VisitEventRow> for VisitEvent {
    fn from(row: VisitEventRow) -> Self {
        VisitEvent {
            id: row.id,
            customer_key: CustomerKey::new(row.customer_key),
            business_key: BusinessKey::new(row.business_key),
            recorded_at: row.recorded_at,
            resulting_count: row.resulting_count,
        }
    }
}

/// Increments the count and appends the event in one statement. The row
/// lock taken by the UPDATE serialises concurrent visits of one customer
/// until the surrounding transaction ends.
async fn bump_count(conn: &mut PgConnection, visit: &NewVisit) -> Result<Option<VisitEvent>, DomainError> {
    let row: Option<VisitEventRow> = sqlx::query_as(
        r#"
        WITH bumped AS (
            UPDATE customers
            SET visit_count = visit_count + 1, modified_at = $3
            WHERE business_key = $1 AND customer_key = $2
            RETURNING customer_key, business_key, visit_count
        )
        INSERT INTO visit_events (id, customer_key, business_key, recorded_at, resulting_count)
        SELECT $4, customer_key, business_key, $3, visit_count FROM bumped
        RETURNING id, customer_key, business_key, recorded_at, resulting_count
        "#,
    )
    .bind(visit.business_key.as_str())
    .bind(visit.customer_key.as_str())
    .bind(visit.recorded_at)
    .bind(Uuid::new_v4())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| storage_error("recording visit", e))?;

    Ok(row.map(|r| r.into()))
}

/// Records the visit and any claim it owes on `tx`, and commits only a
/// complete write. Every early return drops `tx`, which rolls it back.
async fn write_visit(mut tx: Transaction<'_, Postgres>, visit: &NewVisit) -> Result<Option<VisitWrite>, DomainError> {
    let Some(event) = bump_count(&mut *tx, visit).await? else {
        return Ok(None);
    };

    let claim = match visit.claim_for(event.resulting_count) {
        None => None,
        Some(claim) => match insert_claim(&mut *tx, &claim).await? {
            ClaimInsert::Inserted(claim) | ClaimInsert::CycleAlreadyIssued(claim) => Some(claim),
            ClaimInsert::TokenTaken => {
                tx.rollback().await.map_err(|e| storage_error("rolling back visit", e))?;
                debug!("Visit of {} rolled back: claim token taken", visit.customer_key);
                return Ok(Some(VisitWrite::TokenTaken));
            }
        },
    };

    tx.commit().await.map_err(|e| storage_error("committing visit", e))?;
    Ok(Some(VisitWrite::Recorded { event, claim }))
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn record_visit(&self, visit: &NewVisit) -> Result<Option<VisitWrite>, DomainError> {
        let tx = self.pool.begin().await.map_err(|e| storage_error("starting visit", e))?;
        write_visit(tx, visit).await
    }

    async fn register_with_visit(&self, customer: &Customer, visit: &NewVisit) -> Result<VisitWrite, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_error("starting registration", e))?;
        insert_customer(&mut *tx, customer).await?;

        write_visit(tx, visit).await?.ok_or_else(|| {
            DomainError::StorageUnavailable(format!("visit for {} does not match its customer", customer.key))
        })
    }

    async fn recent_visits(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        limit: i64,
    ) -> Result<Vec<VisitEvent>, DomainError> {
        let rows: Vec<VisitEventRow> = sqlx::query_as(
            r#"
            SELECT id, customer_key, business_key, recorded_at, resulting_count
            FROM visit_events
            WHERE business_key = $1 AND customer_key = $2
            ORDER BY resulting_count DESC
            LIMIT $3
            "#,
        )
        .bind(business.as_str())
        .bind(customer.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("listing visits", e))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}
