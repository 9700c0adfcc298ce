//! Claim lookup and redemption

use axum::{
    extract::{Path, State},
    Json,
};

use crate::dto::{ClaimDetails, RedeemResponse};
use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/claims/{token}
pub async fn claim_details(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ApiResponse<ClaimDetails>>> {
    let claim = state.issuer.lookup(&token).await?;
    Ok(Json(ApiResponse::success(claim.into())))
}

/// POST /api/v1/claims/{token}/redeem
pub async fn redeem_claim(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ApiResponse<RedeemResponse>>> {
    let claim = state.issuer.claim(&token).await?;
    let claimed_at = claim.claimed_at.unwrap_or(claim.created_at);

    Ok(Json(ApiResponse::success(RedeemResponse {
        customer: claim.customer_key.to_string(),
        reward_title: claim.reward_title,
        claimed_at,
    })))
}
