use std::sync::Arc;
use crmsync_core::{Config, CorrelationStore, OrderSync, ProductCatalog, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    sync: OrderSync,
    catalog: Arc<dyn ProductCatalog>,
    correlation: Arc<dyn CorrelationStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        sync: OrderSync,
        catalog: Arc<dyn ProductCatalog>,
        correlation: Arc<dyn CorrelationStore>,
    ) -> Self {
        Self {
            config,
            sync,
            catalog,
            correlation,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn sync(&self) -> &OrderSync {
        &self.sync
    }

    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.catalog.as_ref()
    }

    pub fn correlation(&self) -> &dyn CorrelationStore {
        self.correlation.as_ref()
    }

    /// Key webhook callers must present, if ingress is protected.
    pub fn ingress_api_key(&self) -> Option<&str> {
        self.config
            .ingress
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}
