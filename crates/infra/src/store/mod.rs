//! Variant persistence boundary.
//!
//! [`VariantStore`] is implemented by an in-memory table for tests/dev and by a
//! Postgres adapter for deployments. Both serialize stock mutations per row.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryVariantStore;
pub use postgres::PostgresVariantStore;
pub use r#trait::{StoreError, VariantStore};
