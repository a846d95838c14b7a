//! Infrastructure layer: variant stores, configuration, and the variant service.

pub mod config;
pub mod ids;
pub mod store;
pub mod variant_service;

pub use config::{AppConfig, ConfigError, DatabaseConfig, StoreBackend};
pub use ids::{IdSource, SequentialIds};
pub use store::{InMemoryVariantStore, PostgresVariantStore, StoreError, VariantStore};
pub use variant_service::{CallContext, GetVariant, ServiceError, VariantService};
