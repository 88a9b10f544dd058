use crate::{
    entities::{order, order_item, Order, OrderItem, OrderModel, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::checkout::ShippingDetails,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order persistence and lifecycle service.
///
/// Orders are created exactly once per payment session (`payment_session_id`
/// is unique at the store level) and only ever move forward through their
/// status machine; see [`OrderStatus::can_transition_to`].
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// One snapshot line for a new order
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Input for creating an order, provisional or reconciled
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payment_session_id: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub shipping_address: Option<ShippingDetails>,
    pub lines: Vec<NewOrderLine>,
}

/// An order with its snapshot lines
#[derive(Debug)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<order_item::Model>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Inserts an order and its lines in one transaction.
    ///
    /// A second insert for the same `payment_session_id` fails the unique
    /// index; callers that can see duplicates (the webhook reconciler)
    /// check `ServiceError::is_unique_violation` on the result.
    #[instrument(skip(self, new_order), fields(session_id = %new_order.payment_session_id))]
    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order_id = Uuid::new_v4();
        let shipping_json = new_order
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ServiceError::InternalError(format!("shipping serialization: {}", e)))?;

        let order = order::ActiveModel {
            id: Set(order_id),
            payment_session_id: Set(new_order.payment_session_id.clone()),
            customer_id: Set(new_order.customer_id),
            status: Set(new_order.status),
            total_amount: Set(new_order.total_amount),
            currency: Set(new_order.currency.clone()),
            shipping_address: Set(shipping_json),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let order = order.insert(&txn).await?;

        for line in &new_order.lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.unit_price * Decimal::from(line.quantity)),
                created_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        info!(
            "Created order {} for session {} with status {}",
            order_id, new_order.payment_session_id, new_order.status
        );
        Ok(order)
    }

    /// Looks up the order correlated with a payment session, if any
    pub async fn find_by_payment_session(
        &self,
        payment_session_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::PaymentSessionId.eq(payment_session_id))
            .one(&*self.db)
            .await?)
    }

    /// Fetches an order with its lines
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order.find_related(OrderItem).all(&*self.db).await?;

        Ok(OrderWithItems { order, items })
    }

    /// Lists orders newest-first with pagination
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Advances an order's status, enforcing the forward-only machine
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = order.status;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "{} -> {} is not a valid order transition",
                current, next
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: current.to_string(),
                new_status: next.to_string(),
            })
            .await;

        info!("Order {} transitioned {} -> {}", order_id, current, next);
        Ok(updated)
    }
}
