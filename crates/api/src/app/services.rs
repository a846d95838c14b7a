//! Service wiring: picks the variant store backend from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use catalog_infra::{
    AppConfig, InMemoryVariantStore, PostgresVariantStore, StoreBackend, StoreError, VariantService, VariantStore,
};

pub type DynVariantStore = Arc<dyn VariantStore>;

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub variants: VariantService<DynVariantStore>,
}

impl AppServices {
    pub fn new(store: DynVariantStore, request_timeout: Duration) -> Self {
        Self {
            variants: VariantService::new(store, request_timeout),
        }
    }

    /// In-memory store; used by tests and local development.
    pub fn in_memory(request_timeout: Duration) -> Self {
        Self::new(Arc::new(InMemoryVariantStore::new()), request_timeout)
    }
}

/// Build services for the configured backend, applying the schema when persistent.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.store {
        StoreBackend::InMemory => {
            info!("using in-memory variant store");
            Ok(AppServices::in_memory(config.request_timeout))
        }
        StoreBackend::Postgres(db) => {
            let store = PostgresVariantStore::connect(db).await?;
            store.migrate().await?;
            info!(max_connections = db.max_connections, "using postgres variant store");
            Ok(AppServices::new(Arc::new(store), config.request_timeout))
        }
    }
}
