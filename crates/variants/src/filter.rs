//! Listing filters and paging.

use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult, Money, ProductId};

use crate::variant::ProductVariant;

/// Page size used when the caller passes a zero limit.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<Money>,
    pub max: Option<Money>,
}

impl PriceRange {
    pub fn contains(&self, price: Money) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// Closed set of listing filters. Soft-deleted variants never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFilter {
    pub product_id: Option<ProductId>,
    pub active_only: bool,
    pub price_range: Option<PriceRange>,
    pub material: Option<String>,
}

impl VariantFilter {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(PriceRange {
            min: Some(min),
            max: Some(max),
        }) = self.price_range
        {
            if min > max {
                return Err(DomainError::validation(format!(
                    "price range min ({min}) exceeds max ({max})"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, variant: &ProductVariant) -> bool {
        if variant.is_deleted() {
            return false;
        }
        if let Some(product_id) = self.product_id {
            if variant.product_id != product_id {
                return false;
            }
        }
        if self.active_only && !variant.is_active {
            return false;
        }
        if let Some(range) = &self.price_range {
            if !range.contains(variant.price) {
                return false;
            }
        }
        if let Some(material) = &self.material {
            if &variant.material != material {
                return false;
            }
        }
        true
    }
}

/// Page window over a filtered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Zero limit selects the default page size; larger limits are clamped.
    pub fn new(limit: u32, offset: u32) -> Self {
        let limit = match limit {
            0 => DEFAULT_PAGE_SIZE,
            l => l.min(MAX_PAGE_SIZE),
        };
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// One page of variants plus the number of rows matching the filter overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPage {
    pub variants: Vec<ProductVariant>,
    pub total_count: u64,
}
