//! Order-scoped persistence of resolved CRM identifiers.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteCorrelationStore;
pub use store::{CorrelationError, CorrelationStore};
pub use types::{CorrelationField, CorrelationMeta};
