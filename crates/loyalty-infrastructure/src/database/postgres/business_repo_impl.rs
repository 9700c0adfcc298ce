// ============================================================================
// Loyalty Infrastructure - PostgreSQL Business Repository
// File: crates/loyalty-infrastructure/src/database/postgres/business_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;

use loyalty_core::domain::{Business, BusinessKey, Channel};
use loyalty_core::error::DomainError;
use loyalty_core::repositories::BusinessRepository;

use super::storage_error;

pub struct PgBusinessRepository {
    pool: PgPool,
}

impl PgBusinessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BusinessRow {
    pub business_key: String,
    pub name: String,
    pub visit_goal: i32,
    pub reward_title: String,
    pub channel_order: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        let channel_order = row
            .channel_order
            .iter()
            .filter_map(|raw| {
                let channel = Channel::from_str(raw);
                if channel.is_none() {
                    warn!("Ignoring unknown channel '{}' for business {}", raw, row.business_key);
                }
                channel
            })
            .collect();

        Business {
            key: BusinessKey::new(row.business_key),
            name: row.name,
            visit_goal: row.visit_goal,
            reward_title: row.reward_title,
            channel_order,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

#[async_trait]
impl BusinessRepository for PgBusinessRepository {
    async fn find_by_key(&self, key: &BusinessKey) -> Result<Option<Business>, DomainError> {
        let row: Option<BusinessRow> = sqlx::query_as(
            r#"
            SELECT business_key, name, visit_goal, reward_title, channel_order, created_at, modified_at
            FROM businesses
            WHERE business_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("finding business", e))?;

        Ok(row.map(|r| r.into()))
    }
}
