use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartModel, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shopping cart service, keyed by buyer.
///
/// Each buyer owns at most one cart (`carts.customer_id` is unique) and a
/// product appears at most once per cart; re-adding an existing product
/// increments its quantity instead of duplicating the row. The checkout
/// flow consumes `get_cart` and the reconciler calls `clear_cart` after a
/// successful payment.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// One priced cart line, joined with the live catalog for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub image_url: Option<String>,
}

/// A buyer's cart with its lines
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartLine>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches the buyer's cart, creating an empty one on first use
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        match cart.insert(&*self.db).await {
            Ok(created) => Ok(created),
            // Lost a create race against another request from the same
            // buyer; the winner's cart is the one to use
            Err(e)
                if matches!(
                    e.sql_err(),
                    Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
                ) =>
            {
                Cart::find()
                    .filter(cart::Column::CustomerId.eq(customer_id))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "cart vanished after unique violation".to_string(),
                        )
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adds a product to the buyer's cart, incrementing quantity if the
    /// product is already present
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::InvalidInput(
                "quantity must be at least 1".to_string(),
            ));
        }

        // Only known products can be carted
        if Product::find_by_id(product_id).one(&*self.db).await?.is_none() {
            return Err(ServiceError::ProductNotFound(product_id.to_string()));
        }

        let cart = self.get_or_create_cart(customer_id).await?;
        let txn = self.db.begin().await?;

        let existing_item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let current_quantity = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current_quantity + quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let cart_item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            cart_item.insert(&txn).await?;
        }

        self.touch_cart(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{}",
            cart.id, product_id, quantity
        );
        self.get_cart(customer_id).await
    }

    /// Sets the quantity of a cart line; zero or negative removes the line
    #[instrument(skip(self))]
    pub async fn set_item_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        let txn = self.db.begin().await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        if quantity <= 0 {
            item.delete(&txn).await?;
        } else {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        }

        self.touch_cart(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Removes a product from the buyer's cart
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Returns the buyer's cart lines joined with live catalog data
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let items = rows
            .into_iter()
            .map(|(item, product)| match product {
                Some(p) => CartLine {
                    product_id: item.product_id,
                    name: p.name,
                    unit_price: p.price,
                    quantity: item.quantity,
                    image_url: p.image_url,
                },
                // Product removed from the catalog after being carted
                None => CartLine {
                    product_id: item.product_id,
                    name: "Unavailable product".to_string(),
                    unit_price: Decimal::ZERO,
                    quantity: item.quantity,
                    image_url: None,
                },
            })
            .collect();

        Ok(CartView {
            cart_id: cart.id,
            items,
        })
    }

    /// Empties the buyer's cart. Called by the reconciler after a
    /// successful payment and by the explicit clear endpoint; a buyer
    /// without a cart is already clear.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        else {
            warn!(%customer_id, "clear requested for a buyer without a cart");
            return Ok(());
        };

        let txn = self.db.begin().await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        self.touch_cart(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;

        info!("Cleared cart: {}", cart.id);
        Ok(())
    }

    async fn touch_cart(
        &self,
        conn: &impl ConnectionTrait,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?
            .into();
        cart.updated_at = Set(Utc::now());
        cart.update(conn).await?;
        Ok(())
    }
}
