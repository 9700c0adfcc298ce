// ============================================================================
// Loyalty API - Visit Handlers
// File: crates/loyalty-api/src/handlers/visits.rs
// ============================================================================
//! Scan intake: resolve the identity payload, record the visit, report the reward

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use validator::Validate;

use loyalty_core::domain::BusinessKey;

use crate::dto::{RecordVisitRequest, VisitResponse};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/visits
pub async fn record_visit(
    State(state): State<AppState>,
    payload: Result<Json<RecordVisitRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<VisitResponse>>> {
    let Json(payload) = payload?;
    payload.validate()?;

    let customer = state
        .resolver
        .resolve(&payload.identity_payload)
        .ok_or_else(|| ApiError::NotFound("No customer identifier in scan payload".to_string()))?;
    let business = BusinessKey::new(payload.business_key.trim());

    let evaluation = state.engine.evaluate_and_issue(&customer, &business).await?;
    let progress = evaluation.visit.progress();
    let token = evaluation.outcome.token();

    Ok(Json(ApiResponse::success(VisitResponse {
        customer: customer.to_string(),
        visit_count: progress.visit_count,
        visits_in_cycle: progress.visits_in_cycle,
        visit_goal: progress.visit_goal,
        reward_issued: token.is_some(),
        claim_token: token.map(|t| t.to_string()),
        claim_qr_url: token.map(|t| state.qr.image_url(t.as_str())),
    })))
}
