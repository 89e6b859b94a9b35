//! Product mapping lookup.

use thiserror::Error;

use super::mapping::{MappingNamespace, ProductMapping};

/// Error type for product catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid mapping stored for {namespace} {id}: {reason}")]
    InvalidMapping {
        namespace: &'static str,
        id: u64,
        reason: String,
    },
}

/// Read/write access to product mappings.
pub trait ProductCatalog: Send + Sync {
    /// Get the mapping stored for a product or variation.
    fn mapping(
        &self,
        namespace: MappingNamespace,
        id: u64,
    ) -> Result<Option<ProductMapping>, CatalogError>;

    /// Insert or replace a mapping.
    fn upsert(
        &self,
        namespace: MappingNamespace,
        id: u64,
        mapping: &ProductMapping,
    ) -> Result<(), CatalogError>;

    /// Remove a mapping. Returns true if one existed.
    fn remove(&self, namespace: MappingNamespace, id: u64) -> Result<bool, CatalogError>;

    /// Mapping for a product, `Unset` when none is stored.
    fn product_mapping(&self, product_id: u64) -> Result<ProductMapping, CatalogError> {
        Ok(self
            .mapping(MappingNamespace::Product, product_id)?
            .unwrap_or_default())
    }
}
