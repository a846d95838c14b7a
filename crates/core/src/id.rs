//! Strongly-typed identifiers used across the domain.
//!
//! Variants and products are keyed by store-assigned surrogate integers. Zero is
//! never a valid identifier; request layers use it to mean "not supplied".

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a product variant (surrogate key assigned by the store).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(u64);

/// Identifier of the parent product a variant belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

macro_rules! impl_numeric_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Zero means "unset" on the wire.
            pub const fn is_unset(self) -> bool {
                self.0 == 0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if raw == 0 {
                    return Err(DomainError::invalid_id(format!("{}: must be non-zero", $name)));
                }
                Ok(Self(raw))
            }
        }
    };
}

impl_numeric_newtype!(VariantId, "VariantId");
impl_numeric_newtype!(ProductId, "ProductId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        let id: VariantId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!("0".parse::<VariantId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("abc".parse::<ProductId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("-3".parse::<ProductId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&VariantId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
