//! SQLite-backed product catalog.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogError, MappingNamespace, ProductCatalog, ProductMapping};

/// SQLite-backed product mapping store.
pub struct SqliteProductCatalog {
    conn: Mutex<Connection>,
}

impl SqliteProductCatalog {
    /// Create a new catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS product_mappings (
                namespace TEXT NOT NULL,
                id INTEGER NOT NULL,
                mapping TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, id)
            );
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))
    }
}

impl ProductCatalog for SqliteProductCatalog {
    fn mapping(
        &self,
        namespace: MappingNamespace,
        id: u64,
    ) -> Result<Option<ProductMapping>, CatalogError> {
        let conn = self.conn.lock().unwrap();

        let json: Option<String> = conn
            .query_row(
                "SELECT mapping FROM product_mappings WHERE namespace = ? AND id = ?",
                params![namespace.as_str(), id as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        json.map(|json| {
            serde_json::from_str(&json).map_err(|e| CatalogError::InvalidMapping {
                namespace: namespace.as_str(),
                id,
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    fn upsert(
        &self,
        namespace: MappingNamespace,
        id: u64,
        mapping: &ProductMapping,
    ) -> Result<(), CatalogError> {
        let json =
            serde_json::to_string(mapping).map_err(|e| CatalogError::Database(e.to_string()))?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO product_mappings (namespace, id, mapping, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, id) DO UPDATE SET
                mapping = excluded.mapping,
                updated_at = excluded.updated_at
            "#,
            params![namespace.as_str(), id as i64, json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, namespace: MappingNamespace, id: u64) -> Result<bool, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute(
                "DELETE FROM product_mappings WHERE namespace = ? AND id = ?",
                params![namespace.as_str(), id as i64],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::EntityType;
    use tempfile::TempDir;

    #[test]
    fn test_missing_mapping_is_unset() {
        let catalog = SqliteProductCatalog::in_memory().unwrap();
        assert!(catalog
            .mapping(MappingNamespace::Product, 1)
            .unwrap()
            .is_none());
        assert_eq!(
            catalog.product_mapping(1).unwrap().entity_type,
            EntityType::Unset
        );
    }

    #[test]
    fn test_upsert_and_replace() {
        let catalog = SqliteProductCatalog::in_memory().unwrap();
        catalog
            .upsert(
                MappingNamespace::Product,
                10,
                &ProductMapping::contribution(5, 3),
            )
            .unwrap();
        assert_eq!(
            catalog.product_mapping(10).unwrap(),
            ProductMapping::contribution(5, 3)
        );

        catalog
            .upsert(MappingNamespace::Product, 10, &ProductMapping::excluded())
            .unwrap();
        assert_eq!(
            catalog.product_mapping(10).unwrap().entity_type,
            EntityType::Exclude
        );
    }

    #[test]
    fn test_namespaces_are_separate() {
        let catalog = SqliteProductCatalog::in_memory().unwrap();
        catalog
            .upsert(
                MappingNamespace::Variation,
                10,
                &ProductMapping::membership(2, 4, 7),
            )
            .unwrap();

        assert!(catalog
            .mapping(MappingNamespace::Product, 10)
            .unwrap()
            .is_none());
        assert!(catalog
            .mapping(MappingNamespace::Variation, 10)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_remove() {
        let catalog = SqliteProductCatalog::in_memory().unwrap();
        catalog
            .upsert(MappingNamespace::Product, 1, &ProductMapping::excluded())
            .unwrap();
        assert!(catalog.remove(MappingNamespace::Product, 1).unwrap());
        assert!(!catalog.remove(MappingNamespace::Product, 1).unwrap());
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let catalog = SqliteProductCatalog::new(&path).unwrap();
            catalog
                .upsert(
                    MappingNamespace::Product,
                    3,
                    &ProductMapping::contribution(1, 2),
                )
                .unwrap();
        }
        let catalog = SqliteProductCatalog::new(&path).unwrap();
        assert_eq!(
            catalog.product_mapping(3).unwrap(),
            ProductMapping::contribution(1, 2)
        );
    }
}
