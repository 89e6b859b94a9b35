//! SQLite-backed correlation store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{CorrelationError, CorrelationField, CorrelationMeta, CorrelationStore};

/// SQLite-backed correlation store.
pub struct SqliteCorrelationStore {
    conn: Mutex<Connection>,
}

impl SqliteCorrelationStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CorrelationError> {
        let conn =
            Connection::open(path).map_err(|e| CorrelationError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CorrelationError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CorrelationError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CorrelationError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS order_correlation (
                order_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (order_id, key)
            );
            "#,
        )
        .map_err(|e| CorrelationError::Database(e.to_string()))
    }

    fn parse_id(
        order_id: u64,
        field: CorrelationField,
        value: &str,
    ) -> Result<u64, CorrelationError> {
        value
            .trim()
            .parse()
            .map_err(|_| CorrelationError::Corrupt {
                order_id,
                field,
                value: value.to_string(),
            })
    }
}

impl CorrelationStore for SqliteCorrelationStore {
    fn get(&self, order_id: u64) -> Result<CorrelationMeta, CorrelationError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT key, value FROM order_correlation WHERE order_id = ?")
            .map_err(|e| CorrelationError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![order_id as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CorrelationError::Database(e.to_string()))?;

        let mut meta = CorrelationMeta::empty(order_id);
        for row in rows {
            let (key, value) = row.map_err(|e| CorrelationError::Database(e.to_string()))?;
            // Unknown keys belong to newer schema versions.
            let Some(field) = CorrelationField::from_key(&key) else {
                continue;
            };
            match field {
                CorrelationField::ContactId => {
                    meta.contact_id = Some(Self::parse_id(order_id, field, &value)?)
                }
                CorrelationField::ContributionId => {
                    meta.contribution_id = Some(Self::parse_id(order_id, field, &value)?)
                }
                CorrelationField::CampaignId => {
                    meta.campaign_id = Some(Self::parse_id(order_id, field, &value)?)
                }
                CorrelationField::Source => meta.source = Some(value),
            }
        }

        Ok(meta)
    }

    fn set_if_absent(
        &self,
        order_id: u64,
        field: CorrelationField,
        value: &str,
    ) -> Result<bool, CorrelationError> {
        if field.is_numeric() {
            Self::parse_id(order_id, field, value)?;
        }
        let conn = self.conn.lock().unwrap();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO order_correlation (order_id, key, value, updated_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    order_id as i64,
                    field.key(),
                    value,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| CorrelationError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    fn update(
        &self,
        order_id: u64,
        field: CorrelationField,
        value: &str,
    ) -> Result<(), CorrelationError> {
        if field.is_numeric() {
            Self::parse_id(order_id, field, value)?;
        }
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO order_correlation (order_id, key, value, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (order_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![
                order_id as i64,
                field.key(),
                value,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| CorrelationError::Database(e.to_string()))?;

        Ok(())
    }

    fn clear(&self, order_id: u64, field: CorrelationField) -> Result<bool, CorrelationError> {
        let conn = self.conn.lock().unwrap();

        let removed = conn
            .execute(
                "DELETE FROM order_correlation WHERE order_id = ? AND key = ?",
                params![order_id as i64, field.key()],
            )
            .map_err(|e| CorrelationError::Database(e.to_string()))?;

        Ok(removed > 0)
    }
}
