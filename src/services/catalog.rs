use crate::{
    entities::{product, Product, ProductModel, StockPolicy},
    errors::ServiceError,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only catalog access used by checkout for price and stock
/// validation. Catalog maintenance itself lives outside this service.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fetches a product by id
    pub async fn get_product(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        Ok(Product::find_by_id(id).one(&*self.db).await?)
    }

    /// Resolves one requested cart line against the catalog.
    ///
    /// `display_name` is the client's label for the line and is only used
    /// in error messages; the returned model carries the trusted name and
    /// price. Fails with `ProductNotFound` when the id is unknown and
    /// `InsufficientStock` when a tracked product cannot cover the
    /// requested quantity.
    pub async fn resolve_line(
        &self,
        product_id: Uuid,
        display_name: &str,
        quantity: i32,
    ) -> Result<ProductModel, ServiceError> {
        let product = self
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(display_name.to_string()))?;

        ensure_stock(&product, display_name, quantity)?;
        Ok(product)
    }
}

/// Stock check for a single resolved product. Untracked products are
/// always orderable.
pub fn ensure_stock(
    product: &product::Model,
    display_name: &str,
    quantity: i32,
) -> Result<(), ServiceError> {
    if product.stock_policy == StockPolicy::Tracked && quantity > product.stock_on_hand {
        return Err(ServiceError::InsufficientStock(display_name.to_string()));
    }
    Ok(())
}
