use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::validate_input,
    services::CartView,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for the buyer cart surface
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_item).delete(remove_item))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCartItemRequest {
    /// New quantity; zero or negative removes the line
    pub quantity: i32,
}

/// Fetch the authenticated buyer's cart
#[utoipa::path(
    get,
    path = "/api/v1/carts",
    responses(
        (status = 200, description = "The buyer's cart", body = CartView),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CartView>, ServiceError> {
    let view = state.services.cart.get_cart(user.customer_id).await?;
    Ok(Json(view))
}

/// Add a product to the cart; re-adding increments quantity
#[utoipa::path(
    post,
    path = "/api/v1/carts/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 400, description = "Unknown product or invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    validate_input(&payload)?;

    let view = state
        .services
        .cart
        .add_item(user.customer_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(view))
}

/// Set the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/v1/carts/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product whose line to update")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Product not in cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Carts"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state
        .services
        .cart
        .set_item_quantity(user.customer_id, product_id, payload.quantity)
        .await?;
    Ok(Json(view))
}

/// Remove a product from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product to remove")),
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Product not in cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Carts"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state
        .services
        .cart
        .remove_item(user.customer_id, product_id)
        .await?;
    Ok(Json(view))
}

/// Empty the buyer's cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts",
    responses(
        (status = 200, description = "Cart emptied", body = CartView),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Carts"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CartView>, ServiceError> {
    state.services.cart.clear_cart(user.customer_id).await?;
    let view = state.services.cart.get_cart(user.customer_id).await?;
    Ok(Json(view))
}
