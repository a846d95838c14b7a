//! `catalog-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, exact-decimal money, and the domain error taxonomy shared by the
//! variant model, the stores and the service layer.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{ProductId, VariantId};
pub use money::Money;
