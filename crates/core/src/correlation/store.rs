//! Correlation store trait and errors.

use std::fmt;

use super::{CorrelationField, CorrelationMeta};

/// Error type for correlation store operations.
#[derive(Debug)]
pub enum CorrelationError {
    /// A numeric field holds something that is not an id.
    Corrupt {
        order_id: u64,
        field: CorrelationField,
        value: String,
    },
    /// Database error.
    Database(String),
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::Corrupt {
                order_id,
                field,
                value,
            } => write!(
                f,
                "Corrupt {} for order {}: {:?} is not an id",
                field, order_id, value
            ),
            CorrelationError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for CorrelationError {}

/// Order-scoped key/value persistence of resolved CRM identifiers.
///
/// Creation flows write through [`set_if_absent`](Self::set_if_absent), which
/// never replaces a stored value. Only the explicit update flows call
/// [`update`](Self::update).
pub trait CorrelationStore: Send + Sync {
    /// Everything stored for the Order. Missing Orders yield an empty meta.
    fn get(&self, order_id: u64) -> Result<CorrelationMeta, CorrelationError>;

    /// Store the value unless the field is already set. Returns whether it was written.
    fn set_if_absent(
        &self,
        order_id: u64,
        field: CorrelationField,
        value: &str,
    ) -> Result<bool, CorrelationError>;

    /// Store the value, replacing any previous one.
    fn update(
        &self,
        order_id: u64,
        field: CorrelationField,
        value: &str,
    ) -> Result<(), CorrelationError>;

    /// Remove a field. Returns whether anything was removed.
    fn clear(&self, order_id: u64, field: CorrelationField) -> Result<bool, CorrelationError>;
}
