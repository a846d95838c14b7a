use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult, VariantId};

/// Which identifier a variant lookup resolves through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum VariantKey {
    Id(VariantId),
    Sku(String),
    Barcode(String),
}

impl VariantKey {
    /// Pick the identifier to resolve by: id first, then SKU, then barcode.
    ///
    /// A zero id and blank strings count as absent.
    pub fn resolve(id: Option<u64>, sku: Option<&str>, barcode: Option<&str>) -> DomainResult<Self> {
        if let Some(id) = id.filter(|id| *id != 0) {
            return Ok(Self::Id(VariantId::new(id)));
        }
        if let Some(sku) = sku.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(Self::Sku(sku.to_string()));
        }
        if let Some(barcode) = barcode.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(Self::Barcode(barcode.to_string()));
        }
        Err(DomainError::MissingIdentifier)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::Sku(_) => "sku",
            Self::Barcode(_) => "barcode",
        }
    }
}

impl core::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Sku(sku) => write!(f, "sku={sku}"),
            Self::Barcode(code) => write!(f, "barcode={code}"),
        }
    }
}

impl From<VariantId> for VariantKey {
    fn from(id: VariantId) -> Self {
        Self::Id(id)
    }
}
