pub mod compositor;
pub mod config;
pub mod contact;
pub mod correlation;
pub mod crm;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod order;
pub mod status;
pub mod submitter;
pub mod sync;
pub mod testing;

pub use compositor::{ComposedLineItems, Composition, LineItemCompositor};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use contact::{ContactResolution, ContactResolver, ResolvedContact};
pub use correlation::{
    CorrelationError, CorrelationField, CorrelationMeta, CorrelationStore, SqliteCorrelationStore,
};
pub use crm::{CrmClient, CrmError, LookupCache, RestCrmClient};
pub use error::SyncError;
pub use notify::{create_event_channel, SyncEvent, SyncEventEnvelope, SyncEventHandle};
pub use order::{
    CatalogError, EntityType, MappingNamespace, Order, OrderItem, OrderStatus, ProductCatalog,
    ProductMapping, SqliteProductCatalog,
};
pub use status::{OnceToken, StatusSyncOutcome, StatusSynchronizer, SyncTrigger};
pub use submitter::{OrderSubmitter, SubmitOutcome};
pub use sync::{OrderSync, SyncOutcome, SyncReport};
