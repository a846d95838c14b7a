use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use catalog_core::{DomainError, VariantId};
use catalog_variants::{Page, ProductVariant, StockMutation, VariantDraft, VariantFilter, VariantKey, VariantPage};

/// Store-level failures.
///
/// Ledger rejections raised while the row lock is held surface as `Domain`; the
/// transaction that produced them has already been rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("variant not found: {0}")]
    NotFound(String),

    #[error("duplicate sku: {0}")]
    DuplicateSku(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(key: impl core::fmt::Display) -> Self {
        Self::NotFound(key.to_string())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Durable collection of product variants.
///
/// Every stock mutation is a single atomic read-check-write against the row state
/// at the time the row lock is taken; implementations must never decide on a value
/// read outside that lock.
#[async_trait::async_trait]
pub trait VariantStore: Send + Sync {
    /// Persist a new variant and assign its id and timestamps.
    async fn create(&self, draft: VariantDraft) -> Result<ProductVariant, StoreError>;

    /// Overwrite the updatable attribute subset of a live variant.
    async fn update(&self, id: VariantId, draft: VariantDraft) -> Result<ProductVariant, StoreError>;

    /// Lookup by a single identifier. `unscoped` includes soft-deleted rows.
    ///
    /// When several rows share a SKU or barcode, live rows win over soft-deleted
    /// ones and the lowest id wins among equals.
    async fn find(&self, key: &VariantKey, unscoped: bool) -> Result<ProductVariant, StoreError>;

    async fn find_by_id(&self, id: VariantId, unscoped: bool) -> Result<ProductVariant, StoreError> {
        self.find(&VariantKey::Id(id), unscoped).await
    }

    async fn find_by_sku(&self, sku: &str, unscoped: bool) -> Result<ProductVariant, StoreError> {
        self.find(&VariantKey::Sku(sku.to_string()), unscoped).await
    }

    async fn find_by_barcode(&self, barcode: &str, unscoped: bool) -> Result<ProductVariant, StoreError> {
        self.find(&VariantKey::Barcode(barcode.to_string()), unscoped).await
    }

    /// Mark a live variant deleted. The row is kept for unscoped lookups.
    async fn soft_delete(&self, id: VariantId) -> Result<(), StoreError>;

    /// Remove a variant permanently, deleted or not.
    async fn hard_delete(&self, id: VariantId) -> Result<(), StoreError>;

    /// Live variants matching `filter`, ordered by id, windowed by `page`.
    async fn list(&self, filter: &VariantFilter, page: Page) -> Result<VariantPage, StoreError>;

    /// Apply one ledger mutation atomically and return the resulting row.
    async fn apply_stock(&self, id: VariantId, mutation: StockMutation) -> Result<ProductVariant, StoreError>;

    /// Overwrite total stock for every listed variant, all or nothing.
    ///
    /// Rows are locked in ascending id order.
    async fn bulk_set_total(&self, stocks: &BTreeMap<VariantId, u32>) -> Result<Vec<ProductVariant>, StoreError>;

    /// `stock - reserved_stock` of a live variant.
    async fn available_stock(&self, id: VariantId) -> Result<u32, StoreError>;
}

#[async_trait::async_trait]
impl<S> VariantStore for Arc<S>
where
    S: VariantStore + ?Sized,
{
    async fn create(&self, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        (**self).create(draft).await
    }

    async fn update(&self, id: VariantId, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        (**self).update(id, draft).await
    }

    async fn find(&self, key: &VariantKey, unscoped: bool) -> Result<ProductVariant, StoreError> {
        (**self).find(key, unscoped).await
    }

    async fn soft_delete(&self, id: VariantId) -> Result<(), StoreError> {
        (**self).soft_delete(id).await
    }

    async fn hard_delete(&self, id: VariantId) -> Result<(), StoreError> {
        (**self).hard_delete(id).await
    }

    async fn list(&self, filter: &VariantFilter, page: Page) -> Result<VariantPage, StoreError> {
        (**self).list(filter, page).await
    }

    async fn apply_stock(&self, id: VariantId, mutation: StockMutation) -> Result<ProductVariant, StoreError> {
        (**self).apply_stock(id, mutation).await
    }

    async fn bulk_set_total(&self, stocks: &BTreeMap<VariantId, u32>) -> Result<Vec<ProductVariant>, StoreError> {
        (**self).bulk_set_total(stocks).await
    }

    async fn available_stock(&self, id: VariantId) -> Result<u32, StoreError> {
        (**self).available_stock(id).await
    }
}
