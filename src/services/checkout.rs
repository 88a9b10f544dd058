use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{CreateSessionRequest, PaymentGateway, SessionLineItemInput},
    services::{
        catalog::CatalogService,
        orders::{NewOrder, NewOrderLine, OrderService},
    },
};
use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Checkout orchestrator: turns a priced cart into a hosted payment
/// session plus a provisional order.
///
/// The flow validates the submitted cart against the live catalog,
/// recomputes the total from trusted prices, creates the gateway session
/// with the buyer id and shipping fields round-tripped through session
/// metadata, and persists a `pending` order keyed by the session id. True
/// atomicity across the gateway call and the order write is not
/// achievable; a lost provisional write is compensated by the webhook
/// reconciler's create-if-absent path.
#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<CatalogService>,
    orders: Arc<OrderService>,
    gateway: Arc<PaymentGateway>,
    event_sender: Arc<EventSender>,
    public_base_url: String,
    currency: String,
}

/// Shipping details submitted at checkout; all fields mandatory.
/// Embedded into the order as a snapshot and round-tripped through the
/// payment session metadata so the webhook can reconstruct them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingDetails {
    #[validate(length(min = 1))]
    pub recipient_name: String,
    #[validate(length(min = 1))]
    pub address_line: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
}

impl ShippingDetails {
    /// Rejects blank (whitespace-only) fields with the offending field
    /// named in the error
    pub fn ensure_complete(&self) -> Result<(), ServiceError> {
        for (field, value) in [
            ("recipient_name", &self.recipient_name),
            ("address_line", &self.address_line),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "shipping field `{}` must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// One submitted cart line. The client's `unit_price` is accepted for
/// display parity but never trusted: pricing always comes from the
/// catalog.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Result of a successful checkout initiation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub payment_session_id: String,
    pub order_id: Uuid,
    pub checkout_url: Option<String>,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<CatalogService>,
        orders: Arc<OrderService>,
        gateway: Arc<PaymentGateway>,
        event_sender: Arc<EventSender>,
        public_base_url: String,
        currency: String,
    ) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            event_sender,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            currency,
        }
    }

    /// Runs the full checkout orchestration for an authenticated buyer.
    #[instrument(skip(self, buyer, cart, shipping), fields(customer_id = %buyer.customer_id))]
    pub async fn begin_checkout(
        &self,
        buyer: &AuthUser,
        cart: Vec<CheckoutLine>,
        shipping: ShippingDetails,
    ) -> Result<CheckoutOutcome, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::InvalidInput(
                "cart must not be empty".to_string(),
            ));
        }
        shipping.ensure_complete()?;

        for line in &cart {
            if line.quantity < 1 {
                return Err(ServiceError::InvalidInput(format!(
                    "quantity for {} must be at least 1",
                    line.name
                )));
            }
        }

        // Stock checks are independent per line; run them concurrently but
        // surface the first failing line in cart order
        let checks = cart
            .iter()
            .map(|line| self.catalog.resolve_line(line.product_id, &line.name, line.quantity));
        let mut products = Vec::with_capacity(cart.len());
        for resolved in join_all(checks).await {
            products.push(resolved?);
        }

        // Server-side pricing from the stock-checked catalog rows; the
        // client-supplied unit prices play no part in the total
        let total_amount: Decimal = products
            .iter()
            .zip(cart.iter())
            .map(|(product, line)| product.price * Decimal::from(line.quantity))
            .sum();

        let session_request = CreateSessionRequest {
            success_url: format!("{}/checkout/success", self.public_base_url),
            cancel_url: format!("{}/checkout/cancel", self.public_base_url),
            customer_email: buyer.email.clone(),
            currency: self.currency.clone(),
            line_items: products
                .iter()
                .zip(cart.iter())
                .map(|(product, line)| {
                    Ok(SessionLineItemInput {
                        name: product.name.clone(),
                        image_url: product.image_url.clone(),
                        unit_amount_minor: to_minor_units(product.price)?,
                        quantity: i64::from(line.quantity),
                    })
                })
                .collect::<Result<Vec<_>, ServiceError>>()?,
            metadata: vec![
                ("customer_id".to_string(), buyer.customer_id.to_string()),
                ("recipient_name".to_string(), shipping.recipient_name.clone()),
                ("address_line".to_string(), shipping.address_line.clone()),
                ("city".to_string(), shipping.city.clone()),
                ("postal_code".to_string(), shipping.postal_code.clone()),
            ],
        };

        let session = self.gateway.create_checkout_session(&session_request).await?;

        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                customer_id: buyer.customer_id,
                payment_session_id: session.id.clone(),
            })
            .await;

        let lines = products
            .iter()
            .zip(cart.iter())
            .map(|(product, line)| NewOrderLine {
                product_id: Some(product.id),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
            })
            .collect();

        let provisional = NewOrder {
            payment_session_id: session.id.clone(),
            customer_id: buyer.customer_id,
            status: OrderStatus::Pending,
            total_amount,
            currency: self.currency.clone(),
            shipping_address: Some(shipping),
            lines,
        };

        let order = match self.orders.create_order(provisional).await {
            Ok(order) => order,
            Err(e) => {
                // The buyer may still complete payment for this session;
                // the reconciler's create-if-absent path recovers it.
                error!(
                    session_id = %session.id,
                    customer_id = %buyer.customer_id,
                    error = %e,
                    "payment session created but provisional order write failed"
                );
                return Err(ServiceError::InternalError(format!(
                    "provisional order for session {} could not be persisted",
                    session.id
                )));
            }
        };

        info!(
            "Checkout started: order {} session {} total {}",
            order.id, session.id, total_amount
        );

        Ok(CheckoutOutcome {
            payment_session_id: session.id,
            order_id: order.id,
            checkout_url: session.url,
        })
    }
}

/// Converts a catalog price to the gateway's minor currency units
pub(crate) fn to_minor_units(price: Decimal) -> Result<i64, ServiceError> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.round_dp(0).to_i64())
        .ok_or_else(|| ServiceError::InvalidInput("price out of range".to_string()))
}
