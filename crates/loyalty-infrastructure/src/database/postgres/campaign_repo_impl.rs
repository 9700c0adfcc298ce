// ============================================================================
// Loyalty Infrastructure - PostgreSQL Campaign Repository
// File: crates/loyalty-infrastructure/src/database/postgres/campaign_repo_impl.rs
// Description: Campaign records, recipient outcomes and the contact window
// ============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use loyalty_core::domain::{
    BusinessKey, CampaignDraft, CampaignRecipient, CampaignRecord, CampaignResult, CampaignStatus, Channel,
    CustomerKey, DeliveryOutcome,
};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::CampaignRepository;
use loyalty_shared::Pagination;

use super::storage_error;

pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn recipients_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<CampaignRecipient>>, DomainError> {
        let rows: Vec<RecipientRow> = sqlx::query_as(
            r#"
            SELECT campaign_id, customer_key, outcome, channel, detail, recorded_at
            FROM campaign_recipients
            WHERE campaign_id = ANY($1)
            ORDER BY recorded_at
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("listing campaign recipients", e))?;

        let mut grouped: HashMap<Uuid, Vec<CampaignRecipient>> = HashMap::new();
        for row in rows {
            grouped.entry(row.campaign_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[derive(Debug, FromRow)]
struct CampaignRow {
    pub id: Uuid,
    pub business_key: String,
    pub title: String,
    pub body: String,
    pub target_keys: Vec<String>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CampaignRow {
    fn into_record(self, recipients: Vec<CampaignRecipient>) -> CampaignRecord {
        let status = CampaignStatus::from_str(&self.status).unwrap_or_else(|| {
            warn!("Unknown status '{}' on campaign {}", self.status, self.id);
            CampaignStatus::Failed
        });
        CampaignRecord {
            id: self.id,
            business_key: BusinessKey::new(self.business_key),
            title: self.title,
            body: self.body,
            target_keys: self.target_keys.into_iter().map(CustomerKey::new).collect(),
            recipients,
            sent_count: self.sent_count,
            failed_count: self.failed_count,
            skipped_count: self.skipped_count,
            status,
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RecipientRow {
    pub campaign_id: Uuid,
    pub customer_key: String,
    pub outcome: String,
    pub channel: Option<String>,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<RecipientRow> for CampaignRecipient {
    fn from(row: RecipientRow) -> Self {
        CampaignRecipient {
            customer_key: CustomerKey::new(row.customer_key),
            outcome: DeliveryOutcome::from_str(&row.outcome).unwrap_or(DeliveryOutcome::Failed),
            channel: row.channel.as_deref().and_then(Channel::from_str),
            detail: row.detail,
            recorded_at: row.recorded_at,
        }
    }
}

const CAMPAIGN_COLUMNS: &str = "id, business_key, title, body, target_keys, sent_count, failed_count, \
                                skipped_count, status, created_at, finished_at";

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn start_campaign(&self, draft: &CampaignDraft) -> Result<Option<CampaignRecord>, DomainError> {
        let keys: Vec<String> = draft.candidates.iter().map(|k| k.as_str().to_string()).collect();
        let mut tx = self.pool.begin().await.map_err(|e| storage_error("starting campaign", e))?;

        // Conditional upsert: a row contacted after `window_start` keeps its
        // timestamp and is absent from RETURNING. Candidates must be distinct.
        let reserved: Vec<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO customer_contacts (business_key, customer_key, last_contacted_at, campaign_id)
            SELECT $1, candidate, $3, $4
            FROM UNNEST($2::text[]) AS candidate
            ON CONFLICT (business_key, customer_key) DO UPDATE
            SET last_contacted_at = EXCLUDED.last_contacted_at,
                campaign_id = EXCLUDED.campaign_id
            WHERE customer_contacts.last_contacted_at <= $5
            RETURNING customer_key
            "#,
        )
        .bind(draft.business_key.as_str())
        .bind(&keys)
        .bind(draft.created_at)
        .bind(draft.id)
        .bind(draft.window_start)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| storage_error("reserving campaign recipients", e))?;

        // Dropping `tx` releases the (empty) reservation.
        if reserved.is_empty() {
            return Ok(None);
        }

        let reserved: Vec<CustomerKey> = reserved.into_iter().map(|(key,)| CustomerKey::new(key)).collect();
        let record = draft.clone().into_record(&reserved);
        let targets: Vec<String> = record.target_keys.iter().map(|k| k.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, business_key, title, body, target_keys,
                sent_count, failed_count, skipped_count, status, created_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.business_key.as_str())
        .bind(&record.title)
        .bind(&record.body)
        .bind(&targets)
        .bind(record.sent_count)
        .bind(record.failed_count)
        .bind(record.skipped_count)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.finished_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error("creating campaign", e))?;

        tx.commit().await.map_err(|e| storage_error("committing campaign", e))?;
        info!("Campaign created: {} ({} targets)", record.id, targets.len());
        Ok(Some(record))
    }

    async fn record_outcome(&self, campaign_id: Uuid, recipient: &CampaignRecipient) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO campaign_recipients (campaign_id, customer_key, outcome, channel, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (campaign_id, customer_key) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(recipient.customer_key.as_str())
        .bind(recipient.outcome.as_str())
        .bind(recipient.channel.map(|c| c.as_str()))
        .bind(&recipient.detail)
        .bind(recipient.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("recording campaign outcome", e))?;

        Ok(())
    }

    async fn finalize(&self, result: &CampaignResult, finished_at: DateTime<Utc>) -> Result<(), DomainError> {
        let updated = sqlx::query(
            r#"
            UPDATE campaigns
            SET sent_count = $2, failed_count = $3, skipped_count = $4, status = $5, finished_at = $6
            WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(result.campaign_id)
        .bind(result.sent_count)
        .bind(result.failed_count)
        .bind(result.skipped_count)
        .bind(result.status.as_str())
        .bind(finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("finalizing campaign", e))?;

        if updated.rows_affected() == 0 {
            warn!("Campaign {} was already finalized or does not exist", result.campaign_id);
        }
        Ok(())
    }

    async fn find_by_id(&self, business: &BusinessKey, id: Uuid) -> Result<Option<CampaignRecord>, DomainError> {
        let row: Option<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {} FROM campaigns WHERE business_key = $1 AND id = $2",
            CAMPAIGN_COLUMNS
        ))
        .bind(business.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("finding campaign", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut recipients = self.recipients_for(&[row.id]).await?;
        let own = recipients.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_record(own)))
    }

    async fn list_by_business(
        &self,
        business: &BusinessKey,
        pagination: Pagination,
    ) -> Result<Vec<CampaignRecord>, DomainError> {
        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE business_key = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(business.as_str())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("listing campaigns", e))?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut recipients = self.recipients_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let own = recipients.remove(&row.id).unwrap_or_default();
                row.into_record(own)
            })
            .collect())
    }
}
