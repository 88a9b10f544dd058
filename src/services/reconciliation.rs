use crate::{
    entities::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{CheckoutSession, PaymentGateway, SessionLineItem},
    services::{
        carts::CartService,
        checkout::ShippingDetails,
        orders::{NewOrder, NewOrderLine, OrderService},
    },
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Webhook reconciler: the single place where "money has moved" becomes
/// durable order state.
///
/// The gateway delivers completion events at least once; `payment_session_id`
/// uniqueness makes the second delivery a benign no-op rather than a
/// duplicate order. When the provisional order from checkout exists it is
/// advanced `pending -> processing`; when it was lost, the order is created
/// fresh at `processing` from the gateway's own line-item data.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: Arc<OrderService>,
    carts: Arc<CartService>,
    gateway: Arc<PaymentGateway>,
    event_sender: Arc<EventSender>,
}

/// Result of reconciling one completed session
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub order_id: Uuid,
    /// True when this delivery was a replay of an already-reconciled
    /// session
    pub duplicate: bool,
}

impl ReconciliationService {
    pub fn new(
        orders: Arc<OrderService>,
        carts: Arc<CartService>,
        gateway: Arc<PaymentGateway>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            orders,
            carts,
            gateway,
            event_sender,
        }
    }

    /// Reconciles one `checkout.session.completed` event into a durable
    /// order and clears the buyer's cart.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn reconcile_completed_session(
        &self,
        session: &CheckoutSession,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        // The session metadata is the only channel carrying the buyer id
        // back to us; without it there is no recovery path.
        let raw_customer_id = session.metadata.get("customer_id").ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "session {} carries no customer metadata",
                session.id
            ))
        })?;

        let customer_id = Uuid::parse_str(raw_customer_id).map_err(|_| {
            ServiceError::BadRequest(format!(
                "session {} carries a malformed customer id",
                session.id
            ))
        })?;

        if let Some(existing) = self.orders.find_by_payment_session(&session.id).await? {
            return match existing.status {
                OrderStatus::Pending => {
                    let updated = self
                        .orders
                        .transition_status(existing.id, OrderStatus::Processing)
                        .await?;

                    self.event_sender
                        .send_or_log(Event::PaymentSessionCompleted {
                            order_id: updated.id,
                            payment_session_id: session.id.clone(),
                        })
                        .await;

                    self.clear_cart_after_payment(customer_id, updated.id).await?;

                    Ok(ReconciliationOutcome {
                        order_id: updated.id,
                        duplicate: false,
                    })
                }
                status => {
                    // Redelivery of an already-reconciled (or cancelled)
                    // session; acknowledge so the gateway stops retrying
                    info!(
                        order_id = %existing.id,
                        %status,
                        "duplicate completion delivery for session"
                    );
                    self.best_effort_clear(customer_id).await;
                    Ok(ReconciliationOutcome {
                        order_id: existing.id,
                        duplicate: true,
                    })
                }
            };
        }

        // No provisional order survived checkout; rebuild everything from
        // the gateway's view of the session. The event body is not trusted
        // to carry full item detail, so the sub-resource is re-fetched.
        let line_items = self.gateway.list_line_items(&session.id).await?;
        let lines: Vec<NewOrderLine> = line_items.data.iter().map(map_line_item).collect();

        let total_amount = session
            .amount_total
            .map(|minor| Decimal::new(minor, 2))
            .unwrap_or_else(|| {
                lines
                    .iter()
                    .map(|l| l.unit_price * Decimal::from(l.quantity))
                    .sum()
            });

        let currency = session
            .currency
            .clone()
            .unwrap_or_else(|| "usd".to_string());

        let new_order = NewOrder {
            payment_session_id: session.id.clone(),
            customer_id,
            status: OrderStatus::Processing,
            total_amount,
            currency,
            shipping_address: shipping_from_session(session),
            lines,
        };

        let order = match self.orders.create_order(new_order).await {
            Ok(order) => order,
            Err(e) if e.is_unique_violation() => {
                // Concurrent redelivery won the insert race
                let existing = self
                    .orders
                    .find_by_payment_session(&session.id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "order vanished after unique violation".to_string(),
                        )
                    })?;
                info!(
                    order_id = %existing.id,
                    "duplicate completion delivery detected on insert"
                );
                self.best_effort_clear(customer_id).await;
                return Ok(ReconciliationOutcome {
                    order_id: existing.id,
                    duplicate: true,
                });
            }
            Err(e) => return Err(e),
        };

        self.event_sender
            .send_or_log(Event::PaymentSessionCompleted {
                order_id: order.id,
                payment_session_id: session.id.clone(),
            })
            .await;

        self.clear_cart_after_payment(customer_id, order.id).await?;

        Ok(ReconciliationOutcome {
            order_id: order.id,
            duplicate: false,
        })
    }

    /// Clears the buyer's cart after the order is durable. A failure here
    /// never rolls the order back; it is surfaced so the gateway's
    /// redelivery gives the clear another chance.
    async fn clear_cart_after_payment(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        if let Err(e) = self.carts.clear_cart(customer_id).await {
            error!(
                %customer_id,
                %order_id,
                error = %e,
                "order reconciled but cart clear failed"
            );
            return Err(ServiceError::InternalError(format!(
                "order {} recorded but the cart could not be cleared",
                order_id
            )));
        }
        Ok(())
    }

    /// Cart clear on the duplicate path: purely best-effort, the delivery
    /// is acknowledged either way
    async fn best_effort_clear(&self, customer_id: Uuid) {
        if let Err(e) = self.carts.clear_cart(customer_id).await {
            warn!(%customer_id, error = %e, "best-effort cart clear failed");
        }
    }
}

/// Maps one gateway line item to an order snapshot line. Incomplete data
/// falls back to a placeholder name, zero price, and quantity one rather
/// than failing the whole reconciliation.
fn map_line_item(item: &SessionLineItem) -> NewOrderLine {
    let quantity = item.quantity.filter(|q| *q >= 1).unwrap_or(1);
    let unit_price = item
        .price
        .as_ref()
        .and_then(|p| p.unit_amount)
        .map(|minor| Decimal::new(minor, 2))
        .unwrap_or(Decimal::ZERO);

    NewOrderLine {
        product_id: None,
        name: item
            .description
            .clone()
            .unwrap_or_else(|| "Unknown item".to_string()),
        unit_price,
        quantity: quantity.min(i64::from(i32::MAX)) as i32,
    }
}

/// Shipping for a reconciled order: prefer what the gateway collected
/// from the buyer, fall back to the fields round-tripped through session
/// metadata at checkout time.
fn shipping_from_session(session: &CheckoutSession) -> Option<ShippingDetails> {
    if let Some(collected) = &session.shipping_details {
        let address = collected.address.as_ref();
        return Some(ShippingDetails {
            recipient_name: collected.name.clone().unwrap_or_default(),
            address_line: address.and_then(|a| a.line1.clone()).unwrap_or_default(),
            city: address.and_then(|a| a.city.clone()).unwrap_or_default(),
            postal_code: address
                .and_then(|a| a.postal_code.clone())
                .unwrap_or_default(),
        });
    }

    let meta = |key: &str| session.metadata.get(key).cloned();
    match (
        meta("recipient_name"),
        meta("address_line"),
        meta("city"),
        meta("postal_code"),
    ) {
        (None, None, None, None) => None,
        (recipient_name, address_line, city, postal_code) => Some(ShippingDetails {
            recipient_name: recipient_name.unwrap_or_default(),
            address_line: address_line.unwrap_or_default(),
            city: city.unwrap_or_default(),
            postal_code: postal_code.unwrap_or_default(),
        }),
    }
}
