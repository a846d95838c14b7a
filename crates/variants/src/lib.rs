//! Product variant domain module.
//!
//! This crate contains the variant model and its business rules, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage):
//! - [`variant`]: the persisted variant shape and the caller-supplied draft
//! - [`ledger`]: reserve/release/set-total arithmetic over total and reserved stock
//! - [`validation`]: the create/update validation gate
//! - [`lookup`]: identifier resolution for single-variant reads
//! - [`filter`]: listing filters and paging

pub mod filter;
pub mod ledger;
pub mod lookup;
pub mod validation;
pub mod variant;

pub use filter::{Page, PriceRange, VariantFilter, VariantPage};
pub use ledger::{StockAction, StockLevel, StockMutation};
pub use lookup::VariantKey;
pub use validation::VariantValidator;
pub use variant::{ProductVariant, VariantDraft};
