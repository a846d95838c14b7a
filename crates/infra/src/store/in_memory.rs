use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use catalog_core::VariantId;
use catalog_variants::{Page, ProductVariant, StockMutation, VariantDraft, VariantFilter, VariantKey, VariantPage};

use super::r#trait::{StoreError, VariantStore};
use crate::ids::{IdSource, SequentialIds};

/// In-memory variant table.
///
/// Intended for tests/dev. A single writer lock covers the whole table, so every
/// mutation is serialized; lock waits are cancellable because the table is only
/// touched after the guard is held and no await happens while writing.
pub struct InMemoryVariantStore {
    rows: RwLock<BTreeMap<VariantId, ProductVariant>>,
    ids: Arc<dyn IdSource>,
}

impl InMemoryVariantStore {
    pub fn new() -> Self {
        Self::with_id_source(Arc::new(SequentialIds::new()))
    }

    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            ids,
        }
    }

    fn live_mut(
        rows: &mut BTreeMap<VariantId, ProductVariant>,
        id: VariantId,
    ) -> Result<&mut ProductVariant, StoreError> {
        rows.get_mut(&id)
            .filter(|v| !v.is_deleted())
            .ok_or_else(|| StoreError::not_found(VariantKey::Id(id)))
    }
}

impl Default for InMemoryVariantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for InMemoryVariantStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryVariantStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl VariantStore for InMemoryVariantStore {
    async fn create(&self, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        let mut rows = self.rows.write().await;

        if rows.values().any(|v| !v.is_deleted() && v.sku == draft.sku) {
            return Err(StoreError::DuplicateSku(draft.sku));
        }

        let id = self.ids.next_variant_id();
        if id.is_unset() || rows.contains_key(&id) {
            return Err(StoreError::storage(format!("id source produced unusable id {id}")));
        }

        let variant = ProductVariant::from_draft(id, draft, Utc::now());
        rows.insert(id, variant.clone());
        Ok(variant)
    }

    async fn update(&self, id: VariantId, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        let mut rows = self.rows.write().await;
        let row = Self::live_mut(&mut rows, id)?;
        row.apply_update(draft, Utc::now());
        Ok(row.clone())
    }

    async fn find(&self, key: &VariantKey, unscoped: bool) -> Result<ProductVariant, StoreError> {
        let rows = self.rows.read().await;
        let visible = rows.values().filter(|v| v.is_visible(unscoped));

        let found = match key {
            VariantKey::Id(id) => rows.get(id).filter(|v| v.is_visible(unscoped)),
            VariantKey::Sku(sku) => visible
                .filter(|v| &v.sku == sku)
                .min_by_key(|v| (v.is_deleted(), v.id)),
            VariantKey::Barcode(code) => visible
                .filter(|v| &v.barcode == code)
                .min_by_key(|v| (v.is_deleted(), v.id)),
        };

        found.cloned().ok_or_else(|| StoreError::not_found(key))
    }

    async fn soft_delete(&self, id: VariantId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = Self::live_mut(&mut rows, id)?;
        let now = Utc::now();
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(())
    }

    async fn hard_delete(&self, id: VariantId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(VariantKey::Id(id)))
    }

    async fn list(&self, filter: &VariantFilter, page: Page) -> Result<VariantPage, StoreError> {
        let rows = self.rows.read().await;
        let matching: Vec<&ProductVariant> = rows.values().filter(|v| filter.matches(v)).collect();

        let variants = matching
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|v| (*v).clone())
            .collect();

        Ok(VariantPage {
            variants,
            total_count: matching.len() as u64,
        })
    }

    async fn apply_stock(&self, id: VariantId, mutation: StockMutation) -> Result<ProductVariant, StoreError> {
        let mut rows = self.rows.write().await;
        let row = Self::live_mut(&mut rows, id)?;

        let current = row.stock_level();
        let next = current.apply(mutation)?;
        if next != current {
            row.set_stock_level(next, Utc::now());
        }
        Ok(row.clone())
    }

    async fn bulk_set_total(&self, stocks: &BTreeMap<VariantId, u32>) -> Result<Vec<ProductVariant>, StoreError> {
        let mut rows = self.rows.write().await;

        // Check every target before touching any so a miss leaves the table unchanged.
        if let Some(missing) = stocks
            .keys()
            .find(|id| rows.get(*id).is_none_or(|v| v.is_deleted()))
        {
            return Err(StoreError::not_found(VariantKey::Id(*missing)));
        }

        let now = Utc::now();
        let mut updated = Vec::with_capacity(stocks.len());
        for (id, stock) in stocks {
            let row = Self::live_mut(&mut rows, *id)?;
            row.set_stock_level(row.stock_level().set_total(*stock), now);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn available_stock(&self, id: VariantId) -> Result<u32, StoreError> {
        let rows = self.rows.read().await;
        rows.get(&id)
            .filter(|v| !v.is_deleted())
            .map(ProductVariant::available_stock)
            .ok_or_else(|| StoreError::not_found(VariantKey::Id(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use catalog_core::{DomainError, Money, ProductId};
    use catalog_variants::PriceRange;
    use proptest::prelude::*;

    use crate::variant_service::{CallContext, ServiceError, VariantService};

    fn draft(sku: &str, stock: u32) -> VariantDraft {
        VariantDraft::new(ProductId::new(1), sku, Money::from_cents(1000)).with_stock(stock, 0)
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = InMemoryVariantStore::new();
        let a = store.create(draft("A", 1)).await.unwrap();
        let b = store.create(draft("B", 1)).await.unwrap();
        assert_eq!(a.id, VariantId::new(1));
        assert_eq!(b.id, VariantId::new(2));
        assert_eq!(a.created_at, a.updated_at);
    }

    #[tokio::test]
    async fn duplicate_live_sku_is_rejected_but_reusable_after_soft_delete() {
        let store = InMemoryVariantStore::new();
        let first = store.create(draft("DUP", 1)).await.unwrap();

        let err = store.create(draft("DUP", 1)).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateSku("DUP".to_string()));

        store.soft_delete(first.id).await.unwrap();
        let second = store.create(draft("DUP", 1)).await.unwrap();
        assert_ne!(first.id, second.id);

        // Unscoped SKU lookup still prefers the live row.
        let found = store.find_by_sku("DUP", true).await.unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_only_visible_unscoped() {
        let store = InMemoryVariantStore::new();
        let v = store.create(draft("SD", 3)).await.unwrap();
        store.soft_delete(v.id).await.unwrap();

        assert!(matches!(store.find_by_id(v.id, false).await, Err(StoreError::NotFound(_))));
        let found = store.find_by_id(v.id, true).await.unwrap();
        assert!(found.deleted_at.is_some());

        assert!(matches!(store.soft_delete(v.id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.apply_stock(v.id, StockMutation::Reserve(1)).await,
            Err(StoreError::NotFound(_))
        ));

        store.hard_delete(v.id).await.unwrap();
        assert!(matches!(store.find_by_id(v.id, true).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn barcode_lookup_returns_lowest_id() {
        let store = InMemoryVariantStore::new();
        let a = store.create(draft("A", 1).with_barcode("4601234")).await.unwrap();
        store.create(draft("B", 1).with_barcode("4601234")).await.unwrap();
        let found = store.find_by_barcode("4601234", false).await.unwrap();
        assert_eq!(found.id, a.id);
    }

    #[tokio::test]
    async fn update_writes_only_updatable_fields() {
        let store = InMemoryVariantStore::new();
        let mut d = draft("KEEP", 5);
        d.sizes = vec![40, 41];
        let v = store.create(d).await.unwrap();

        let mut change = draft("CHANGED", 9);
        change.product_id = ProductId::new(77);
        change.material = "linen".to_string();
        let updated = store.update(v.id, change).await.unwrap();

        assert_eq!(updated.sku, "KEEP");
        assert_eq!(updated.product_id, ProductId::new(1));
        assert_eq!(updated.sizes, vec![40, 41]);
        assert_eq!(updated.stock, 9);
        assert_eq!(updated.material, "linen");
        assert!(updated.updated_at >= v.updated_at);
    }

    #[tokio::test]
    async fn failed_reservation_leaves_row_unchanged() {
        let store = InMemoryVariantStore::new();
        let v = store.create(draft("R", 5)).await.unwrap();
        let err = store.apply_stock(v.id, StockMutation::Reserve(6)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Domain(DomainError::InsufficientStock {
                requested: 6,
                available: 5
            })
        );
        assert_eq!(store.find_by_id(v.id, false).await.unwrap(), v);
    }

    #[tokio::test]
    async fn bulk_set_total_is_all_or_nothing() {
        let store = InMemoryVariantStore::new();
        let a = store.create(draft("A", 1)).await.unwrap();
        let b = store.create(draft("B", 2)).await.unwrap();

        let mut stocks = BTreeMap::new();
        stocks.insert(a.id, 10);
        stocks.insert(VariantId::new(999), 5);
        assert!(matches!(store.bulk_set_total(&stocks).await, Err(StoreError::NotFound(_))));
        assert_eq!(store.find_by_id(a.id, false).await.unwrap().stock, 1);

        let mut stocks = BTreeMap::new();
        stocks.insert(a.id, 10);
        stocks.insert(b.id, 20);
        let updated = store.bulk_set_total(&stocks).await.unwrap();
        assert_eq!(updated.iter().map(|v| v.stock).collect::<Vec<_>>(), vec![10, 20]);
        assert!(store.bulk_set_total(&BTreeMap::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_orders_and_pages() {
        let store = InMemoryVariantStore::new();
        for (i, cents) in [500, 1500, 2500, 3500].into_iter().enumerate() {
            let d = VariantDraft::new(ProductId::new(1), format!("P{i}"), Money::from_cents(cents));
            store.create(d).await.unwrap();
        }
        let deleted = store
            .create(VariantDraft::new(ProductId::new(1), "GONE", Money::from_cents(2000)))
            .await
            .unwrap();
        store.soft_delete(deleted.id).await.unwrap();

        let filter = VariantFilter {
            product_id: Some(ProductId::new(1)),
            price_range: Some(PriceRange {
                min: Some(Money::from_cents(1000)),
                max: None,
            }),
            ..VariantFilter::default()
        };
        let page = store.list(&filter, Page::new(2, 1)).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(
            page.variants.iter().map(|v| v.sku.as_str()).collect::<Vec<_>>(),
            vec!["P2", "P3"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let store = Arc::new(InMemoryVariantStore::new());
        let v = store.create(draft("HOT", 10)).await.unwrap();

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.apply_stock(v.id, StockMutation::Reserve(3)).await })
            })
            .collect();

        let mut succeeded = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(StoreError::Domain(DomainError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(succeeded, 3);
        let after = store.find_by_id(v.id, false).await.unwrap();
        assert_eq!(after.reserved_stock, 9);
        assert_eq!(store.available_stock(v.id).await.unwrap(), 1);
    }

    struct FixedIds;

    impl IdSource for FixedIds {
        fn next_variant_id(&self) -> VariantId {
            VariantId::new(7)
        }
    }

    #[tokio::test]
    async fn injected_id_source_collision_is_storage_error() {
        let store = InMemoryVariantStore::with_id_source(Arc::new(FixedIds));
        assert_eq!(store.create(draft("A", 1)).await.unwrap().id, VariantId::new(7));
        assert!(matches!(store.create(draft("B", 1)).await, Err(StoreError::Storage(_))));
    }

    #[tokio::test]
    async fn deadline_while_waiting_for_the_table_lock_gives_up_the_wait() {
        let store = Arc::new(InMemoryVariantStore::new());
        let v = store.create(draft("LOCKED", 5)).await.unwrap();
        let svc = VariantService::new(Arc::clone(&store), Duration::from_secs(5));

        let guard = store.rows.write().await;
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = svc.manage_stock(&ctx, v.id, "RESERVE", 1).await.unwrap_err();
        assert!(matches!(&err, ServiceError::Storage(msg) if msg.contains("deadline exceeded")));
        drop(guard);

        let after = svc
            .manage_stock(&CallContext::background(), v.id, "RESERVE", 1)
            .await
            .unwrap();
        assert_eq!(after.reserved_stock, 1);
    }

    fn reserve_or_release() -> impl Strategy<Value = StockMutation> {
        prop_oneof![
            (0u32..40).prop_map(StockMutation::Reserve),
            (0u32..40).prop_map(StockMutation::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: every stored row keeps `reserved_stock <= stock` across any
        /// sequence of reserve/release calls, and a rejected call writes nothing.
        #[test]
        fn stored_rows_never_over_reserve(
            stock in 0u32..100,
            ops in prop::collection::vec(reserve_or_release(), 0..40)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let store = InMemoryVariantStore::new();
                let v = store.create(draft("PROP", stock)).await.unwrap();

                for op in ops {
                    let before = store.find_by_id(v.id, false).await.unwrap();
                    let result = store.apply_stock(v.id, op).await;
                    let after = store.find_by_id(v.id, false).await.unwrap();

                    prop_assert!(after.reserved_stock <= after.stock);
                    match result {
                        Ok(row) => prop_assert_eq!(row, after),
                        Err(StoreError::Domain(_)) => prop_assert_eq!(before, after),
                        Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                    }
                }
                Ok(())
            })?;
        }
    }
}
