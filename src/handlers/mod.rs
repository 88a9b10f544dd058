pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod webhooks;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<crate::services::CatalogService>,
    pub cart: Arc<crate::services::CartService>,
    pub orders: Arc<crate::services::OrderService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub reconciliation: Arc<crate::services::ReconciliationService>,
}

impl AppServices {
    /// Wires every service against the shared pool, event channel, and
    /// gateway client
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        gateway: Arc<PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(crate::services::CatalogService::new(db_pool.clone()));
        let cart = Arc::new(crate::services::CartService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            catalog.clone(),
            orders.clone(),
            gateway.clone(),
            event_sender.clone(),
            config.public_base_url.clone(),
            config.default_currency.clone(),
        ));
        let reconciliation = Arc::new(crate::services::ReconciliationService::new(
            orders.clone(),
            cart.clone(),
            gateway,
            event_sender,
        ));

        Self {
            auth,
            catalog,
            cart,
            orders,
            checkout,
            reconciliation,
        }
    }
}
