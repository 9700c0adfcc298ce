// ============================================================================
// Loyalty API - Customer Handlers
// File: crates/loyalty-api/src/handlers/customers.rs
// ============================================================================
//! Customer registration and progress

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use loyalty_core::domain::{BusinessKey, CustomerKey};
use loyalty_core::services::CustomerOverview;

use crate::dto::{RegisterCustomerRequest, RegisterCustomerResponse};
use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/businesses/{business}/customers
///
/// Registration counts as the customer's first visit.
pub async fn register_customer(
    State(state): State<AppState>,
    Path(business): Path<String>,
    payload: Result<Json<RegisterCustomerRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RegisterCustomerResponse>>)> {
    let Json(payload) = payload?;
    payload.validate()?;
    let business = BusinessKey::new(business);

    // Customer, first visit and any claim it completes are stored together.
    let registration = state
        .customers
        .register(&business, &payload.display_name, payload.phone.as_deref(), payload.email.as_deref())
        .await?;
    let scan_url = state.resolver.scan_link(&state.scan_base_url, &registration.customer.key)?;

    let token = registration.visit.claim.as_ref().map(|claim| claim.token.to_string());
    let response = RegisterCustomerResponse {
        qr_url: state.qr.image_url(&scan_url),
        scan_url,
        visit_count: registration.visit.new_count(),
        reward_issued: token.is_some(),
        claim_token: token,
        customer: registration.customer,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// GET /api/v1/businesses/{business}/customers/{customer}
pub async fn customer_overview(
    State(state): State<AppState>,
    Path((business, customer)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<CustomerOverview>>> {
    let overview = state
        .customers
        .overview(&CustomerKey::new(customer), &BusinessKey::new(business))
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}
