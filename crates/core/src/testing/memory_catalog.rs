//! In-memory product catalog for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::order::{CatalogError, MappingNamespace, ProductCatalog, ProductMapping};

/// Product catalog backed by a HashMap.
#[derive(Debug, Default)]
pub struct MemoryProductCatalog {
    mappings: RwLock<HashMap<(MappingNamespace, u64), ProductMapping>>,
}

impl MemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style product mapping.
    pub fn with_product(self, product_id: u64, mapping: ProductMapping) -> Self {
        self.set_product(product_id, mapping);
        self
    }

    /// Builder-style variation mapping.
    pub fn with_variation(self, variation_id: u64, mapping: ProductMapping) -> Self {
        self.set_variation(variation_id, mapping);
        self
    }

    pub fn set_product(&self, product_id: u64, mapping: ProductMapping) {
        self.mappings
            .write()
            .unwrap()
            .insert((MappingNamespace::Product, product_id), mapping);
    }

    pub fn set_variation(&self, variation_id: u64, mapping: ProductMapping) {
        self.mappings
            .write()
            .unwrap()
            .insert((MappingNamespace::Variation, variation_id), mapping);
    }
}

impl ProductCatalog for MemoryProductCatalog {
    fn mapping(
        &self,
        namespace: MappingNamespace,
        id: u64,
    ) -> Result<Option<ProductMapping>, CatalogError> {
        Ok(self.mappings.read().unwrap().get(&(namespace, id)).cloned())
    }

    fn upsert(
        &self,
        namespace: MappingNamespace,
        id: u64,
        mapping: &ProductMapping,
    ) -> Result<(), CatalogError> {
        self.mappings
            .write()
            .unwrap()
            .insert((namespace, id), mapping.clone());
        Ok(())
    }

    fn remove(&self, namespace: MappingNamespace, id: u64) -> Result<bool, CatalogError> {
        Ok(self
            .mappings
            .write()
            .unwrap()
            .remove(&(namespace, id))
            .is_some())
    }
}
