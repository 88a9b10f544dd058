/// Business-logic services for the storefront commerce core
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod reconciliation;

// Re-export services for convenience
pub use carts::{CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use checkout::{CheckoutLine, CheckoutOutcome, CheckoutService, ShippingDetails};
pub use orders::{NewOrder, NewOrderLine, OrderService, OrderWithItems};
pub use reconciliation::{ReconciliationOutcome, ReconciliationService};
