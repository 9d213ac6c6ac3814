pub mod common;
pub mod orders;
pub mod products;

use crate::db::DbPool;
use crate::services::{orders::OrderService, products::ProductCatalogService};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductCatalogService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            products: Arc::new(ProductCatalogService::new(db_pool.clone())),
            orders: Arc::new(OrderService::new(db_pool)),
        }
    }
}
