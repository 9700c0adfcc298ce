// ============================================================================
// Loyalty API - Router
// File: crates/loyalty-api/src/router.rs
// ============================================================================

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{campaigns, claims, customers, health, visits};
use crate::middleware::limit_claims;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let claim_routes = Router::new()
        .route("/api/v1/claims/{token}", get(claims::claim_details))
        .route("/api/v1/claims/{token}/redeem", post(claims::redeem_claim))
        .route_layer(middleware::from_fn_with_state(state.claim_limiter.clone(), limit_claims));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/api/v1/visits", post(visits::record_visit))
        .route(
            "/api/v1/businesses/{business}/campaigns",
            post(campaigns::dispatch_campaign).get(campaigns::campaign_history),
        )
        .route(
            "/api/v1/businesses/{business}/campaigns/{campaign_id}",
            get(campaigns::campaign_details),
        )
        .route("/api/v1/businesses/{business}/customers", post(customers::register_customer))
        .route(
            "/api/v1/businesses/{business}/customers/{customer}",
            get(customers::customer_overview),
        )
        .merge(claim_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
