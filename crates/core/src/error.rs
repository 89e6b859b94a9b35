//! Pipeline-level error taxonomy.

use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::crm::CrmError;
use crate::order::CatalogError;

/// Errors that abort syncing an Order.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Nothing valid to submit, or configuration that cannot be resolved.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The CRM answered with an error.
    #[error("CRM API error: {0}")]
    Api(#[from] CrmError),

    /// Required CRM configuration is missing, so amounts cannot be computed.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::Api(_) => "api",
            SyncError::Consistency(_) => "consistency",
            SyncError::Storage(_) => "storage",
        }
    }

    /// Human-readable note to attach to the Order.
    pub fn order_note(&self) -> String {
        match self {
            SyncError::Validation(msg) => format!("CRM sync skipped: {}", msg),
            SyncError::Api(err) => format!("CRM sync failed: {}", err),
            SyncError::Consistency(msg) => {
                format!("CRM sync failed, CRM configuration is incomplete: {}", msg)
            }
            SyncError::Storage(msg) => {
                format!("CRM sync failed, could not record CRM linkage: {}", msg)
            }
        }
    }
}

impl From<CorrelationError> for SyncError {
    fn from(err: CorrelationError) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        SyncError::Storage(err.to_string())
    }
}
