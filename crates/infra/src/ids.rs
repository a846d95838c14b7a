//! Surrogate id assignment for stores that do not delegate it to the database.

use std::sync::atomic::{AtomicU64, Ordering};

use catalog_core::VariantId;

/// Source of fresh variant ids.
pub trait IdSource: Send + Sync {
    fn next_variant_id(&self) -> VariantId;
}

/// Monotonic counter starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_variant_id(&self) -> VariantId {
        VariantId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_never_zero() {
        let ids = SequentialIds::starting_at(0);
        assert_eq!(ids.next_variant_id(), VariantId::new(1));
        assert_eq!(ids.next_variant_id(), VariantId::new(2));
    }
}
