use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{CheckoutLine, ShippingDetails},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(start_checkout))
}

/// Checkout submission: the buyer's assembled cart plus shipping details.
/// Validation happens in a fixed order inside the orchestrator so each
/// failure mode yields its own distinct error.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    pub cart: Vec<CheckoutLine>,
    pub shipping_details: ShippingDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub success: bool,
    pub session_id: String,
    pub order_id: Uuid,
    pub checkout_url: Option<String>,
}

/// Start a checkout: price the cart, open a hosted payment session, and
/// record the provisional order
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment session created", body = CheckoutResponse),
        (status = 400, description = "Invalid cart, shipping, or stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ServiceError> {
    let outcome = state
        .services
        .checkout
        .begin_checkout(&user, payload.cart, payload.shipping_details)
        .await?;

    Ok(Json(CheckoutResponse {
        success: true,
        session_id: outcome.payment_session_id,
        order_id: outcome.order_id,
        checkout_url: outcome.checkout_url,
    }))
}
