// ============================================================================
// Loyalty Infrastructure - PostgreSQL Reward Claim Repository
// File: crates/loyalty-infrastructure/src/database/postgres/reward_claim_repo_impl.rs
// Description: Guarded claim inserts and the conditional pending -> claimed update
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, warn};

use loyalty_core::domain::{BusinessKey, ClaimStatus, ClaimToken, CustomerKey, NewRewardClaim, RewardClaim};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::{ClaimInsert, ClaimTransition, RewardClaimRepository};

use super::storage_error;

pub struct PgRewardClaimRepository {
    pool: PgPool,
}

impl PgRewardClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RewardClaimRow {
    pub token: String,
    pub customer_key: String,
    pub business_key: String,
    pub cycle_number: i64,
    pub reward_title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl From<RewardClaimRow> for RewardClaim {
    fn from(row: RewardClaimRow) -> Self {
        let status = ClaimStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!("Unknown claim status '{}' for token row, treating as claimed", row.status);
            ClaimStatus::Claimed
        });
        RewardClaim {
            token: ClaimToken::new(row.token),
            customer_key: CustomerKey::new(row.customer_key),
            business_key: BusinessKey::new(row.business_key),
            cycle_number: row.cycle_number,
            reward_title: row.reward_title,
            status,
            created_at: row.created_at,
            claimed_at: row.claimed_at,
        }
    }
}

const CLAIM_COLUMNS: &str =
    "token, customer_key, business_key, cycle_number, reward_title, status, created_at, claimed_at";

/// Inserts a pending claim on `conn`, so visits can issue inside their own
/// transaction. Either unique constraint (token, or business/customer/cycle)
/// turns the insert into a no-op; the follow-up read tells them apart.
pub(crate) async fn insert_claim(conn: &mut PgConnection, claim: &NewRewardClaim) -> Result<ClaimInsert, DomainError> {
    let inserted: Option<RewardClaimRow> = sqlx::query_as(&format!(
        r#"
        INSERT INTO reward_claims (token, customer_key, business_key, cycle_number, reward_title, status, created_at)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6)
        ON CONFLICT DO NOTHING
        RETURNING {}
        "#,
        CLAIM_COLUMNS
    ))
    .bind(claim.token.as_str())
    .bind(claim.customer_key.as_str())
    .bind(claim.business_key.as_str())
    .bind(claim.cycle_number)
    .bind(&claim.reward_title)
    .bind(claim.created_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| storage_error("inserting reward claim", e))?;

    if let Some(row) = inserted {
        return Ok(ClaimInsert::Inserted(row.into()));
    }

    let existing: Option<RewardClaimRow> = sqlx::query_as(&format!(
        "SELECT {} FROM reward_claims WHERE business_key = $1 AND customer_key = $2 AND cycle_number = $3",
        CLAIM_COLUMNS
    ))
    .bind(claim.business_key.as_str())
    .bind(claim.customer_key.as_str())
    .bind(claim.cycle_number)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| storage_error("finding reward claim by cycle", e))?;

    match existing {
        Some(row) => Ok(ClaimInsert::CycleAlreadyIssued(row.into())),
        None => {
            debug!("Claim token collision for cycle {}", claim.cycle_number);
            Ok(ClaimInsert::TokenTaken)
        }
    }
}

#[async_trait]
impl RewardClaimRepository for PgRewardClaimRepository {
    async fn insert_pending(&self, claim: &NewRewardClaim) -> Result<ClaimInsert, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| storage_error("acquiring connection", e))?;
        insert_claim(&mut conn, claim).await
    }

    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<RewardClaim>, DomainError> {
        let row: Option<RewardClaimRow> =
            sqlx::query_as(&format!("SELECT {} FROM reward_claims WHERE token = $1", CLAIM_COLUMNS))
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage_error("finding reward claim", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_cycle(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
        cycle_number: i64,
    ) -> Result<Option<RewardClaim>, DomainError> {
        let row: Option<RewardClaimRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM reward_claims
            WHERE business_key = $1 AND customer_key = $2 AND cycle_number = $3
            "#,
            CLAIM_COLUMNS
        ))
        .bind(business.as_str())
        .bind(customer.as_str())
        .bind(cycle_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("finding reward claim by cycle", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn mark_claimed(&self, token: &ClaimToken, claimed_at: DateTime<Utc>) -> Result<ClaimTransition, DomainError> {
        let updated: Option<RewardClaimRow> = sqlx::query_as(&format!(
            r#"
            UPDATE reward_claims
            SET status = 'claimed', claimed_at = $2
            WHERE token = $1 AND status = 'pending'
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        ))
        .bind(token.as_str())
        .bind(claimed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("claiming reward", e))?;

        if let Some(row) = updated {
            return Ok(ClaimTransition::Claimed(row.into()));
        }

        Ok(match self.find_by_token(token).await? {
            Some(existing) => ClaimTransition::AlreadyClaimed(existing),
            None => ClaimTransition::NotFound,
        })
    }

    async fn list_for_customer(
        &self,
        business: &BusinessKey,
        customer: &CustomerKey,
    ) -> Result<Vec<RewardClaim>, DomainError> {
        let rows: Vec<RewardClaimRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM reward_claims
            WHERE business_key = $1 AND customer_key = $2
            ORDER BY cycle_number DESC
            "#,
            CLAIM_COLUMNS
        ))
        .bind(business.as_str())
        .bind(customer.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("listing reward claims", e))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}
