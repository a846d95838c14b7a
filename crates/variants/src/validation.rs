//! Pre-commit validation for variant create/update.
//!
//! Stock-ledger operations do not pass through here; they enforce their own
//! invariants in [`crate::ledger`].

use catalog_core::{DomainError, DomainResult, Money};

use crate::variant::VariantDraft;

/// Checks a draft against the catalog rules, reporting the first failure.
///
/// Rules, in order:
/// 1. SKU is non-empty.
/// 2. Price is strictly positive.
/// 3. Product id is set.
/// 4. Reserved stock does not exceed total stock.
/// 5. Discount is not negative.
/// 6. Price and discount fit the stored precision (below `10^10`).
/// 7. Minimum order is at least one.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariantValidator;

impl VariantValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, draft: &VariantDraft) -> DomainResult<()> {
        if draft.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU is required"));
        }
        if !draft.price.is_positive() {
            return Err(DomainError::validation("price must be positive"));
        }
        if draft.product_id.is_unset() {
            return Err(DomainError::validation("product_id is required"));
        }
        if draft.reserved_stock > draft.stock {
            return Err(DomainError::validation(format!(
                "reserved_stock ({}) cannot exceed stock ({})",
                draft.reserved_stock, draft.stock
            )));
        }
        if draft.discount.is_negative() {
            return Err(DomainError::validation("discount cannot be negative"));
        }
        let max = Money::max_stored();
        if draft.price > max {
            return Err(DomainError::validation(format!("price cannot exceed {max}")));
        }
        if draft.discount > max {
            return Err(DomainError::validation(format!("discount cannot exceed {max}")));
        }
        if draft.min_order == 0 {
            return Err(DomainError::validation("min_order must be at least 1"));
        }
        Ok(())
    }
}
