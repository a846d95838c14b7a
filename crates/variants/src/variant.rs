use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{Money, ProductId, VariantId};

use crate::ledger::StockLevel;

/// Attribute set supplied by callers on create and update.
///
/// Everything except the store-owned fields (identity and timestamps). On update
/// only a subset is written, see [`ProductVariant::apply_update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDraft {
    pub product_id: ProductId,
    pub sku: String,
    pub barcode: String,
    pub price: Money,
    pub discount: Money,
    pub rating: u32,
    pub material: String,
    pub dimensions: String,
    pub sizes: Vec<u32>,
    pub colors: Vec<String>,
    pub images: Vec<String>,
    pub min_order: u32,
    pub is_active: bool,
    pub stock: u32,
    pub reserved_stock: u32,
}

impl VariantDraft {
    /// Draft with catalog defaults: active, no discount, minimum order of one.
    pub fn new(product_id: ProductId, sku: impl Into<String>, price: Money) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            barcode: String::new(),
            price,
            discount: Money::zero(),
            rating: 0,
            material: String::new(),
            dimensions: String::new(),
            sizes: Vec::new(),
            colors: Vec::new(),
            images: Vec::new(),
            min_order: 1,
            is_active: true,
            stock: 0,
            reserved_stock: 0,
        }
    }

    pub fn with_stock(mut self, stock: u32, reserved_stock: u32) -> Self {
        self.stock = stock;
        self.reserved_stock = reserved_stock;
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = barcode.into();
        self
    }
}

/// One purchasable configuration of a product, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub barcode: String,
    pub price: Money,
    pub discount: Money,
    pub rating: u32,
    pub material: String,
    pub dimensions: String,
    pub sizes: Vec<u32>,
    pub colors: Vec<String>,
    pub images: Vec<String>,
    pub min_order: u32,
    pub is_active: bool,
    pub stock: u32,
    pub reserved_stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProductVariant {
    pub fn from_draft(id: VariantId, draft: VariantDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            product_id: draft.product_id,
            sku: draft.sku,
            barcode: draft.barcode,
            price: draft.price,
            discount: draft.discount,
            rating: draft.rating,
            material: draft.material,
            dimensions: draft.dimensions,
            sizes: draft.sizes,
            colors: draft.colors,
            images: draft.images,
            min_order: draft.min_order,
            is_active: draft.is_active,
            stock: draft.stock,
            reserved_stock: draft.reserved_stock,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Write the updatable attribute set from `draft`.
    ///
    /// Touches price, discount, reserved_stock, stock, material, barcode, is_active,
    /// images, min_order, dimensions and `updated_at`. SKU, product, rating, sizes
    /// and colors keep their stored values.
    pub fn apply_update(&mut self, draft: VariantDraft, now: DateTime<Utc>) {
        self.price = draft.price;
        self.discount = draft.discount;
        self.reserved_stock = draft.reserved_stock;
        self.stock = draft.stock;
        self.material = draft.material;
        self.barcode = draft.barcode;
        self.is_active = draft.is_active;
        self.images = draft.images;
        self.min_order = draft.min_order;
        self.dimensions = draft.dimensions;
        self.updated_at = now;
    }

    pub fn stock_level(&self) -> StockLevel {
        StockLevel::new(self.stock, self.reserved_stock)
    }

    /// Write a ledger result back onto the row.
    pub fn set_stock_level(&mut self, level: StockLevel, now: DateTime<Utc>) {
        self.stock = level.stock;
        self.reserved_stock = level.reserved;
        self.updated_at = now;
    }

    pub fn available_stock(&self) -> u32 {
        self.stock_level().available()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Visible to a lookup with the given scoping flag.
    pub fn is_visible(&self, unscoped: bool) -> bool {
        unscoped || !self.is_deleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> VariantDraft {
        VariantDraft::new(ProductId::new(3), "SKU-1", Money::from_cents(1999)).with_stock(10, 2)
    }

    #[test]
    fn from_draft_copies_attributes_and_stamps_time() {
        let now = Utc::now();
        let v = ProductVariant::from_draft(VariantId::new(1), draft(), now);
        assert_eq!(v.sku, "SKU-1");
        assert_eq!(v.stock, 10);
        assert_eq!(v.reserved_stock, 2);
        assert_eq!(v.available_stock(), 8);
        assert_eq!(v.created_at, now);
        assert!(!v.is_deleted());
    }

    #[test]
    fn apply_update_leaves_identity_fields_untouched() {
        let now = Utc::now();
        let mut v = ProductVariant::from_draft(VariantId::new(1), draft(), now);
        v.sizes = vec![42];

        let mut changed = VariantDraft::new(ProductId::new(99), "OTHER", Money::from_cents(500));
        changed.material = "wool".to_string();
        changed.stock = 20;
        v.apply_update(changed, now);

        assert_eq!(v.sku, "SKU-1");
        assert_eq!(v.product_id, ProductId::new(3));
        assert_eq!(v.sizes, vec![42]);
        assert_eq!(v.material, "wool");
        assert_eq!(v.price, Money::from_cents(500));
        assert_eq!(v.stock, 20);
    }

    #[test]
    fn soft_deleted_rows_are_only_visible_unscoped() {
        let mut v = ProductVariant::from_draft(VariantId::new(1), draft(), Utc::now());
        v.deleted_at = Some(Utc::now());
        assert!(!v.is_visible(false));
        assert!(v.is_visible(true));
    }
}
