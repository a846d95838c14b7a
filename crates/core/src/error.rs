//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock invariants, identity). Missing rows and SKU collisions are detected by the
/// store and reported through its own error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed a validation rule (e.g. empty SKU, non-positive price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A reservation would push reserved stock above total stock.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// A release would drive reserved stock below zero.
    #[error("invalid release quantity: requested {requested}, reserved {reserved}")]
    InvalidReleaseQuantity { requested: u32, reserved: u32 },

    /// The stock action tag is not one of RESERVE, RELEASE, UPDATE.
    #[error("invalid stock action: {0}")]
    InvalidStockAction(String),

    /// A lookup was attempted without any identifier (id, SKU or barcode).
    #[error("identifier required (id, sku or barcode)")]
    MissingIdentifier,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_stock_action(tag: impl Into<String>) -> Self {
        Self::InvalidStockAction(tag.into())
    }
}
