use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PedalPoint Commerce API",
        version = "1.0.0",
        description = r#"
# PedalPoint Commerce API

Storefront backend for the PedalPoint bicycle shop: carts, checkout via a
hosted payment gateway, and webhook-driven order reconciliation.

## Authentication

Buyer and admin endpoints require a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

The payment webhook is unauthenticated but signature-verified.
        "#,
        contact(
            name = "PedalPoint Engineering",
            email = "eng@pedalpoint.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Cart-to-payment-session orchestration"),
        (name = "Carts", description = "Buyer cart management"),
        (name = "Orders", description = "Order lookup and admin lifecycle"),
        (name = "Payments", description = "Payment gateway callbacks")
    ),
    paths(
        // Checkout
        crate::handlers::checkout::start_checkout,

        // Carts
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,

        // Webhooks
        crate::handlers::webhooks::payment_webhook,
    ),
    components(
        schemas(
            // Checkout types
            crate::handlers::checkout::CheckoutRequest,
            crate::handlers::checkout::CheckoutResponse,
            crate::services::CheckoutLine,
            crate::services::ShippingDetails,

            // Cart types
            crate::handlers::carts::AddCartItemRequest,
            crate::handlers::carts::UpdateCartItemRequest,
            crate::services::CartLine,
            crate::services::CartView,

            // Order types
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::entities::OrderStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
