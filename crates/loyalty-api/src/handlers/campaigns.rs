//! Campaign dispatch and history

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use loyalty_core::domain::{BusinessKey, CampaignRecord, CampaignResult, CustomerKey};
use loyalty_shared::Pagination;

use crate::dto::{DispatchCampaignRequest, PageQuery};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/businesses/{business}/campaigns
///
/// Runs the whole batch before responding; pacing makes large batches slow.
pub async fn dispatch_campaign(
    State(state): State<AppState>,
    Path(business): Path<String>,
    payload: Result<Json<DispatchCampaignRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CampaignResult>>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let recipients: Vec<CustomerKey> = payload
        .customer_keys
        .iter()
        .map(|key| CustomerKey::new(key.trim()))
        .collect();

    let result = state
        .dispatcher
        .dispatch(&BusinessKey::new(business), &payload.title, &payload.body, &recipients)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/v1/businesses/{business}/campaigns
pub async fn campaign_history(
    State(state): State<AppState>,
    Path(business): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<CampaignRecord>>>> {
    let Query(query) = query?;
    let pagination = Pagination::new(query.page, query.per_page);

    let campaigns = state.dispatcher.history(&BusinessKey::new(business), pagination).await?;
    Ok(Json(ApiResponse::success(campaigns)))
}

/// GET /api/v1/businesses/{business}/campaigns/{campaign_id}
pub async fn campaign_details(
    State(state): State<AppState>,
    Path((business, campaign_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<ApiResponse<CampaignRecord>>> {
    let campaign = state
        .dispatcher
        .find(&BusinessKey::new(business), campaign_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {}", campaign_id)))?;
    Ok(Json(ApiResponse::success(campaign)))
}
