//! Variant application service.
//!
//! Orchestrates one request against the store:
//!
//! ```text
//! request
//!   ↓
//! 1. Resolve identifiers / parse the action tag
//!   ↓
//! 2. Validate (create and update only)
//!   ↓
//! 3. Run the store operation under the call deadline
//!   ↓
//! 4. Map store and domain failures into ServiceError
//! ```
//!
//! Nothing is retried. A failure at any step leaves stored state unchanged.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{instrument, warn};

use catalog_core::{DomainError, VariantId};
use catalog_variants::{
    Page, ProductVariant, StockAction, StockMutation, VariantDraft, VariantFilter, VariantKey, VariantPage,
    VariantValidator,
};

use crate::store::{StoreError, VariantStore};

/// Per-call options carried from the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// No caller deadline; the service default applies.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Lookup request accepted by [`VariantService::get_variant`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetVariant {
    pub id: Option<u64>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub unscoped: bool,
}

impl GetVariant {
    pub fn by_id(id: VariantId) -> Self {
        Self {
            id: Some(id.get()),
            ..Self::default()
        }
    }

    pub fn by_sku(sku: impl Into<String>) -> Self {
        Self {
            sku: Some(sku.into()),
            ..Self::default()
        }
    }

    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate sku: {0}")]
    DuplicateSku(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("invalid release quantity: requested {requested}, reserved {reserved}")]
    InvalidReleaseQuantity { requested: u32, reserved: u32 },

    #[error("invalid stock action: {0}")]
    InvalidStockAction(String),

    #[error("identifier required (id, sku or barcode)")]
    MissingIdentifier,

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::DuplicateSku(_) => "duplicate_sku",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidReleaseQuantity { .. } => "invalid_release_quantity",
            Self::InvalidStockAction(_) => "invalid_stock_action",
            Self::MissingIdentifier => "missing_identifier",
            Self::InvalidId(_) => "invalid_id",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::InsufficientStock { requested, available } => {
                Self::InsufficientStock { requested, available }
            }
            DomainError::InvalidReleaseQuantity { requested, reserved } => {
                Self::InvalidReleaseQuantity { requested, reserved }
            }
            DomainError::InvalidStockAction(tag) => Self::InvalidStockAction(tag),
            DomainError::MissingIdentifier => Self::MissingIdentifier,
            DomainError::InvalidId(msg) => Self::InvalidId(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::DuplicateSku(sku) => Self::DuplicateSku(sku),
            StoreError::Domain(err) => err.into(),
            StoreError::Storage(msg) => Self::Storage(msg),
        }
    }
}

fn deadline_exceeded(operation: &'static str) -> ServiceError {
    warn!(operation, "deadline exceeded");
    ServiceError::Storage(format!("{operation}: deadline exceeded"))
}

/// Variant use cases over any [`VariantStore`].
#[derive(Debug, Clone)]
pub struct VariantService<S> {
    store: S,
    validator: VariantValidator,
    default_timeout: Duration,
}

impl<S> VariantService<S>
where
    S: VariantStore,
{
    pub fn new(store: S, default_timeout: Duration) -> Self {
        Self {
            store,
            validator: VariantValidator::new(),
            default_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a store call under the effective deadline.
    ///
    /// On expiry the store future is dropped, which releases any lock wait and rolls
    /// back an open transaction.
    async fn run<T, F>(&self, ctx: &CallContext, operation: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let deadline = ctx
            .deadline()
            .unwrap_or_else(|| Instant::now() + self.default_timeout);

        // `timeout_at` polls the inner future once before checking the clock.
        if Instant::now() >= deadline {
            return Err(deadline_exceeded(operation));
        }

        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(deadline_exceeded(operation)),
        }
    }

    #[instrument(skip_all, fields(sku = %draft.sku, product_id = %draft.product_id), err)]
    pub async fn create_variant(&self, ctx: &CallContext, draft: VariantDraft) -> Result<ProductVariant, ServiceError> {
        self.validator.validate(&draft)?;
        self.run(ctx, "create_variant", self.store.create(draft)).await
    }

    /// Overwrite the updatable fields of an existing variant.
    ///
    /// SKU and product id in `draft` are validated but not written.
    #[instrument(skip_all, fields(variant_id = %id), err)]
    pub async fn update_variant(
        &self,
        ctx: &CallContext,
        id: VariantId,
        draft: VariantDraft,
    ) -> Result<ProductVariant, ServiceError> {
        if id.is_unset() {
            return Err(ServiceError::MissingIdentifier);
        }
        self.validator.validate(&draft)?;
        self.run(ctx, "update_variant", self.store.update(id, draft)).await
    }

    /// Fetch by id, else SKU, else barcode.
    #[instrument(skip_all, fields(unscoped = req.unscoped), err)]
    pub async fn get_variant(&self, ctx: &CallContext, req: &GetVariant) -> Result<ProductVariant, ServiceError> {
        let key = VariantKey::resolve(req.id, req.sku.as_deref(), req.barcode.as_deref())?;
        self.run(ctx, "get_variant", self.store.find(&key, req.unscoped)).await
    }

    #[instrument(skip_all, fields(limit = page.limit, offset = page.offset), err)]
    pub async fn list_variants(
        &self,
        ctx: &CallContext,
        filter: &VariantFilter,
        page: Page,
    ) -> Result<VariantPage, ServiceError> {
        filter.validate()?;
        self.run(ctx, "list_variants", self.store.list(filter, page)).await
    }

    /// Apply a RESERVE, RELEASE or UPDATE action.
    ///
    /// The tag is matched case-insensitively; anything else is rejected before the
    /// store is touched.
    #[instrument(skip_all, fields(variant_id = %id, action = %action, quantity = quantity), err)]
    pub async fn manage_stock(
        &self,
        ctx: &CallContext,
        id: VariantId,
        action: &str,
        quantity: u32,
    ) -> Result<ProductVariant, ServiceError> {
        let action: StockAction = action.parse()?;
        self.apply_stock(ctx, id, StockMutation::from_action(action, quantity))
            .await
    }

    pub async fn apply_stock(
        &self,
        ctx: &CallContext,
        id: VariantId,
        mutation: StockMutation,
    ) -> Result<ProductVariant, ServiceError> {
        let variant = self
            .run(ctx, "manage_stock", self.store.apply_stock(id, mutation))
            .await?;

        if matches!(mutation, StockMutation::SetTotal(_)) && !variant.stock_level().is_consistent() {
            warn!(
                variant_id = %id,
                stock = variant.stock,
                reserved_stock = variant.reserved_stock,
                "stock overwrite left variant over-reserved"
            );
        }
        Ok(variant)
    }

    #[instrument(skip_all, fields(variant_id = %id), err)]
    pub async fn available_stock(&self, ctx: &CallContext, id: VariantId) -> Result<u32, ServiceError> {
        self.run(ctx, "available_stock", self.store.available_stock(id))
            .await
    }

    /// Overwrite total stock for several variants in one transaction.
    #[instrument(skip_all, fields(count = stocks.len()), err)]
    pub async fn bulk_set_stock(
        &self,
        ctx: &CallContext,
        stocks: &BTreeMap<VariantId, u32>,
    ) -> Result<Vec<ProductVariant>, ServiceError> {
        if stocks.keys().any(|id| id.is_unset()) {
            return Err(ServiceError::MissingIdentifier);
        }
        let updated = self
            .run(ctx, "bulk_set_stock", self.store.bulk_set_total(stocks))
            .await?;

        for variant in updated.iter().filter(|v| !v.stock_level().is_consistent()) {
            warn!(
                variant_id = %variant.id,
                stock = variant.stock,
                reserved_stock = variant.reserved_stock,
                "stock overwrite left variant over-reserved"
            );
        }
        Ok(updated)
    }

    /// Soft delete, or permanent removal when `unscoped`.
    #[instrument(skip_all, fields(variant_id = %id, unscoped = unscoped), err)]
    pub async fn delete_variant(&self, ctx: &CallContext, id: VariantId, unscoped: bool) -> Result<(), ServiceError> {
        if id.is_unset() {
            return Err(ServiceError::MissingIdentifier);
        }
        if unscoped {
            self.run(ctx, "delete_variant", self.store.hard_delete(id)).await
        } else {
            self.run(ctx, "delete_variant", self.store.soft_delete(id)).await
        }
    }
}
