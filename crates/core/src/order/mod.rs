//! Commerce orders and the product mappings that drive their sync.

mod catalog;
mod mapping;
mod sqlite_catalog;
mod types;

pub use catalog::{CatalogError, ProductCatalog};
pub use mapping::{EntityType, MappingNamespace, ProductMapping};
pub use sqlite_catalog::SqliteProductCatalog;
pub use types::{BillingDetails, Order, OrderItem, OrderStatus};
