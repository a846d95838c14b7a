use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, Money, ProductId, VariantId};
use catalog_infra::GetVariant;
use catalog_variants::{Page, PriceRange, ProductVariant, VariantDraft, VariantFilter, VariantPage};

// -------------------------
// Request DTOs
// -------------------------

/// Body of create and update requests.
///
/// Every field is optional on the wire so that missing values reach the validator
/// and come back as `validation_error` rather than a decode failure. Money accepts
/// either a JSON string (`"19.99"`) or a number.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VariantRequest {
    pub product_id: u64,
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

impl Default for VariantRequest {
    fn default() -> Self {
        Self {
            product_id: 0,
            sku: String::new(),
            barcode: String::new(),
            price: Money::zero(),
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
}

impl From<VariantRequest> for VariantDraft {
    fn from(body: VariantRequest) -> Self {
        VariantDraft {
            product_id: ProductId::new(body.product_id),
            sku: body.sku,
            barcode: body.barcode,
            price: body.price,
            discount: body.discount,
            rating: body.rating,
            material: body.material,
            dimensions: body.dimensions,
            sizes: body.sizes,
            colors: body.colors,
            images: body.images,
            min_order: body.min_order,
            is_active: body.is_active,
            stock: body.stock,
            reserved_stock: body.reserved_stock,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ManageStockRequest {
    pub action: String,
    pub quantity: u32,
}

/// `{"stocks": {"<variant id>": <new total>, ...}}`
#[derive(Debug, Deserialize)]
pub struct BulkStockRequest {
    pub stocks: BTreeMap<String, u32>,
}

impl BulkStockRequest {
    pub fn into_map(self) -> Result<BTreeMap<VariantId, u32>, DomainError> {
        self.stocks
            .into_iter()
            .map(|(id, stock)| Ok((id.parse::<VariantId>()?, stock)))
            .collect()
    }
}

/// `id` stays a string on the wire so a malformed value reports `invalid_id`, the
/// same as a malformed path id.
#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub id: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub unscoped: Option<bool>,
}

impl LookupQuery {
    /// Blank and zero ids count as absent so lookup falls through to SKU and barcode.
    pub fn into_request(self) -> Result<GetVariant, DomainError> {
        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") | Some("0") => None,
            Some(raw) => Some(raw.parse::<VariantId>()?.get()),
        };
        Ok(GetVariant {
            id,
            sku: self.sku,
            barcode: self.barcode,
            unscoped: self.unscoped.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub unscoped: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub product_id: Option<u64>,
    pub active_only: Option<bool>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub material: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub fn filter(&self) -> VariantFilter {
        let price_range = match (self.min_price, self.max_price) {
            (None, None) => None,
            (min, max) => Some(PriceRange { min, max }),
        };
        VariantFilter {
            product_id: self.product_id.filter(|id| *id != 0).map(ProductId::new),
            active_only: self.active_only.unwrap_or(false),
            price_range,
            material: self.material.clone().filter(|m| !m.is_empty()),
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.limit.unwrap_or(0), self.offset.unwrap_or(0))
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct VariantResponse {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub available_stock: u32,
}

impl From<ProductVariant> for VariantResponse {
    fn from(variant: ProductVariant) -> Self {
        let available_stock = variant.available_stock();
        Self {
            variant,
            available_stock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VariantListResponse {
    pub variants: Vec<VariantResponse>,
    pub total_count: u64,
    pub limit: u32,
    pub offset: u32,
}

impl VariantListResponse {
    pub fn new(page: VariantPage, window: Page) -> Self {
        Self {
            variants: page.variants.into_iter().map(VariantResponse::from).collect(),
            total_count: page.total_count,
            limit: window.limit,
            offset: window.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub id: VariantId,
    pub stock: u32,
    pub reserved_stock: u32,
    pub available_stock: u32,
}

impl From<&ProductVariant> for StockResponse {
    fn from(v: &ProductVariant) -> Self {
        Self {
            id: v.id,
            stock: v.stock,
            reserved_stock: v.reserved_stock,
            available_stock: v.available_stock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_request_accepts_string_or_number_money() {
        let body: VariantRequest =
            serde_json::from_str(r#"{"product_id": 1, "sku": "A", "price": "19.99", "discount": 1.5}"#).unwrap();
        assert_eq!(body.price, Money::from_cents(1999));
        assert_eq!(body.discount, Money::from_cents(150));
        assert_eq!(body.min_order, 1);
        assert!(body.is_active);
    }

    #[test]
    fn bulk_request_rejects_non_numeric_ids() {
        let mut stocks = BTreeMap::new();
        stocks.insert("abc".to_string(), 3);
        let err = BulkStockRequest { stocks }.into_map().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn list_query_builds_filter_and_page() {
        let q = ListQuery {
            product_id: Some(4),
            min_price: Some(Money::from_cents(100)),
            limit: Some(1_000),
            ..ListQuery::default()
        };
        let filter = q.filter();
        assert_eq!(filter.product_id, Some(ProductId::new(4)));
        assert_eq!(filter.price_range.and_then(|r| r.min), Some(Money::from_cents(100)));
        assert_eq!(q.page().limit, catalog_variants::filter::MAX_PAGE_SIZE);
    }

    #[test]
    fn lookup_query_parses_ids_like_path_ids() {
        let q = LookupQuery {
            id: Some("abc".to_string()),
            ..LookupQuery::default()
        };
        assert!(matches!(q.into_request(), Err(DomainError::InvalidId(_))));

        let q = LookupQuery {
            id: Some(" 0 ".to_string()),
            sku: Some("TEE".to_string()),
            ..LookupQuery::default()
        };
        let req = q.into_request().unwrap();
        assert_eq!(req.id, None);
        assert_eq!(req.sku.as_deref(), Some("TEE"));

        let q = LookupQuery {
            id: Some("42".to_string()),
            unscoped: Some(true),
            ..LookupQuery::default()
        };
        let req = q.into_request().unwrap();
        assert_eq!(req.id, Some(42));
        assert!(req.unscoped);
    }
}
