//! Postgres-backed variant store.
//!
//! ## Concurrency
//!
//! Every stock mutation runs in its own transaction:
//! 1. `SET LOCAL lock_timeout` bounds how long the transaction waits for row locks
//! 2. `SELECT … FOR UPDATE` locks the live row and reads its ledger columns
//! 3. the ledger arithmetic runs against that locked state
//! 4. the new counters are written and the transaction commits
//!
//! A rejected mutation rolls back without writing. Dropping the future mid-flight
//! drops the `Transaction`, which rolls back as well.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) on insert | `23505` | `DuplicateSku` |
//! | Database (lock not available) | `55P03` | `Storage` (lock timeout) |
//! | Database (other) | Any other | `Storage` |
//! | PoolTimedOut / PoolClosed / Io / other | N/A | `Storage` |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{instrument, warn};

use catalog_core::{Money, ProductId, VariantId};
use catalog_variants::{Page, ProductVariant, StockMutation, VariantDraft, VariantFilter, VariantKey, VariantPage};

use super::r#trait::{StoreError, VariantStore};
use crate::config::DatabaseConfig;

const MIGRATION: &str = include_str!("../../migrations/0001_product_variants.sql");

macro_rules! variant_columns {
    () => {
        "id, product_id, sku, barcode, price, discount, rating, material, dimensions, \
         sizes, colors, images, min_order, is_active, stock, reserved_stock, \
         created_at, updated_at, deleted_at"
    };
}

/// Postgres-backed variant store.
///
/// `Send + Sync`; clones share the same pool.
#[derive(Debug, Clone)]
pub struct PostgresVariantStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresVariantStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, config.lock_timeout))
    }

    /// Create the `product_variants` table and its indexes if missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction whose row-lock waits are bounded by `lock_timeout`.
    async fn begin_locked(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        // SET does not take bind parameters; the value is an integer we format ourselves.
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&stmt)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(tx)
    }

    async fn lock_live_row(
        tx: &mut Transaction<'static, Postgres>,
        id: VariantId,
    ) -> Result<Option<ProductVariant>, StoreError> {
        let row: Option<VariantRow> = sqlx::query_as(concat!(
            "SELECT ",
            variant_columns!(),
            " FROM product_variants WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(db_id(id))
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_row", e))?;

        row.map(ProductVariant::try_from).transpose()
    }
}

#[async_trait::async_trait]
impl VariantStore for PostgresVariantStore {
    #[instrument(skip(self, draft), fields(sku = %draft.sku, product_id = %draft.product_id), err)]
    async fn create(&self, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        let row: VariantRow = sqlx::query_as(concat!(
            "INSERT INTO product_variants (product_id, sku, barcode, price, discount, rating, \
             material, dimensions, sizes, colors, images, min_order, is_active, stock, reserved_stock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING ",
            variant_columns!()
        ))
        .bind(db_product_id(draft.product_id))
        .bind(&draft.sku)
        .bind(&draft.barcode)
        .bind(draft.price.amount())
        .bind(draft.discount.amount())
        .bind(i64::from(draft.rating))
        .bind(&draft.material)
        .bind(&draft.dimensions)
        .bind(Json(&draft.sizes))
        .bind(Json(&draft.colors))
        .bind(Json(&draft.images))
        .bind(i64::from(draft.min_order))
        .bind(draft.is_active)
        .bind(i64::from(draft.stock))
        .bind(i64::from(draft.reserved_stock))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateSku(draft.sku.clone())
            } else {
                map_sqlx_error("create", e)
            }
        })?;

        row.try_into()
    }

    #[instrument(skip(self, draft), fields(variant_id = %id), err)]
    async fn update(&self, id: VariantId, draft: VariantDraft) -> Result<ProductVariant, StoreError> {
        let row: Option<VariantRow> = sqlx::query_as(concat!(
            "UPDATE product_variants SET price = $2, discount = $3, reserved_stock = $4, stock = $5, \
             material = $6, barcode = $7, is_active = $8, images = $9, min_order = $10, \
             dimensions = $11, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING ",
            variant_columns!()
        ))
        .bind(db_id(id))
        .bind(draft.price.amount())
        .bind(draft.discount.amount())
        .bind(i64::from(draft.reserved_stock))
        .bind(i64::from(draft.stock))
        .bind(&draft.material)
        .bind(&draft.barcode)
        .bind(draft.is_active)
        .bind(Json(&draft.images))
        .bind(i64::from(draft.min_order))
        .bind(&draft.dimensions)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        row.ok_or_else(|| StoreError::not_found(VariantKey::Id(id)))?
            .try_into()
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn find(&self, key: &VariantKey, unscoped: bool) -> Result<ProductVariant, StoreError> {
        let query = match key {
            VariantKey::Id(id) => sqlx::query_as::<_, VariantRow>(concat!(
                "SELECT ",
                variant_columns!(),
                " FROM product_variants WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
            ))
            .bind(db_id(*id)),
            VariantKey::Sku(sku) => sqlx::query_as::<_, VariantRow>(concat!(
                "SELECT ",
                variant_columns!(),
                " FROM product_variants WHERE sku = $1 AND ($2 OR deleted_at IS NULL) \
                 ORDER BY deleted_at IS NOT NULL, id ASC LIMIT 1"
            ))
            .bind(sku.as_str()),
            VariantKey::Barcode(code) => sqlx::query_as::<_, VariantRow>(concat!(
                "SELECT ",
                variant_columns!(),
                " FROM product_variants WHERE barcode = $1 AND ($2 OR deleted_at IS NULL) \
                 ORDER BY deleted_at IS NOT NULL, id ASC LIMIT 1"
            ))
            .bind(code.as_str()),
        };

        let row = query
            .bind(unscoped)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        row.ok_or_else(|| StoreError::not_found(key))?.try_into()
    }

    #[instrument(skip(self), fields(variant_id = %id), err)]
    async fn soft_delete(&self, id: VariantId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE product_variants SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(db_id(id))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(VariantKey::Id(id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(variant_id = %id), err)]
    async fn hard_delete(&self, id: VariantId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(db_id(id))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("hard_delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(VariantKey::Id(id)));
        }
        Ok(())
    }

    #[instrument(skip(self, filter), fields(limit = page.limit, offset = page.offset), err)]
    async fn list(&self, filter: &VariantFilter, page: Page) -> Result<VariantPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product_variants");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_count", e))?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            variant_columns!(),
            " FROM product_variants"
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));

        let rows: Vec<VariantRow> = select
            .build_query_as()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        let variants = rows
            .into_iter()
            .map(ProductVariant::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VariantPage {
            variants,
            total_count: u64::try_from(total).unwrap_or_default(),
        })
    }

    #[instrument(
        skip(self),
        fields(variant_id = %id, action = %mutation.action(), quantity = mutation.quantity()),
        err
    )]
    async fn apply_stock(&self, id: VariantId, mutation: StockMutation) -> Result<ProductVariant, StoreError> {
        let mut tx = self.begin_locked("apply_stock").await?;

        let Some(current) = Self::lock_live_row(&mut tx, id).await? else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::not_found(VariantKey::Id(id)));
        };

        let level = current.stock_level();
        let next = match level.apply(mutation) {
            Ok(next) => next,
            Err(err) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(err.into());
            }
        };

        if next == level {
            tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
            return Ok(current);
        }

        let row: VariantRow = sqlx::query_as(concat!(
            "UPDATE product_variants SET stock = $2, reserved_stock = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING ",
            variant_columns!()
        ))
        .bind(db_id(id))
        .bind(i64::from(next.stock))
        .bind(i64::from(next.reserved))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("apply_stock", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        row.try_into()
    }

    #[instrument(skip(self, stocks), fields(count = stocks.len()), err)]
    async fn bulk_set_total(&self, stocks: &BTreeMap<VariantId, u32>) -> Result<Vec<ProductVariant>, StoreError> {
        if stocks.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.begin_locked("bulk_set_total").await?;
        let mut updated = Vec::with_capacity(stocks.len());

        // BTreeMap iteration is ascending by id, which fixes the lock order across callers.
        for (id, stock) in stocks {
            let row: Option<VariantRow> = sqlx::query_as(concat!(
                "UPDATE product_variants SET stock = $2, updated_at = NOW() \
                 WHERE id = $1 AND deleted_at IS NULL RETURNING ",
                variant_columns!()
            ))
            .bind(db_id(*id))
            .bind(i64::from(*stock))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("bulk_set_total", e))?;

            match row {
                Some(row) => updated.push(ProductVariant::try_from(row)?),
                None => {
                    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(StoreError::not_found(VariantKey::Id(*id)));
                }
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(variant_id = %id), err)]
    async fn available_stock(&self, id: VariantId) -> Result<u32, StoreError> {
        let row = sqlx::query(
            "SELECT stock, reserved_stock FROM product_variants WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(db_id(id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("available_stock", e))?
        .ok_or_else(|| StoreError::not_found(VariantKey::Id(id)))?;

        let stock: i64 = row.try_get("stock").map_err(|e| map_sqlx_error("available_stock", e))?;
        let reserved: i64 = row
            .try_get("reserved_stock")
            .map_err(|e| map_sqlx_error("available_stock", e))?;
        Ok(u32::try_from((stock - reserved).max(0)).unwrap_or(u32::MAX))
    }
}

/// Append the listing predicates. Soft-deleted rows are always excluded.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &VariantFilter) {
    qb.push(" WHERE deleted_at IS NULL");
    if let Some(product_id) = filter.product_id {
        qb.push(" AND product_id = ").push_bind(db_product_id(product_id));
    }
    if filter.active_only {
        qb.push(" AND is_active");
    }
    if let Some(range) = filter.price_range {
        if let Some(min) = range.min {
            qb.push(" AND price >= ").push_bind(min.amount());
        }
        if let Some(max) = range.max {
            qb.push(" AND price <= ").push_bind(max.amount());
        }
    }
    if let Some(material) = &filter.material {
        qb.push(" AND material = ").push_bind(material.clone());
    }
}

/// Ids beyond `i64::MAX` cannot exist in a `BIGSERIAL` column; they map to a value that
/// matches nothing.
fn db_id(id: VariantId) -> i64 {
    i64::try_from(id.get()).unwrap_or(-1)
}

fn db_product_id(id: ProductId) -> i64 {
    i64::try_from(id.get()).unwrap_or(-1)
}

/// Database row representation for `product_variants`.
#[derive(Debug)]
struct VariantRow {
    id: i64,
    product_id: i64,
    sku: String,
    barcode: String,
    price: Decimal,
    discount: Decimal,
    rating: i64,
    material: String,
    dimensions: String,
    sizes: Json<Vec<u32>>,
    colors: Json<Vec<String>>,
    images: Json<Vec<String>>,
    min_order: i64,
    is_active: bool,
    stock: i64,
    reserved_stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for VariantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(VariantRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            sku: row.try_get("sku")?,
            barcode: row.try_get("barcode")?,
            price: row.try_get("price")?,
            discount: row.try_get("discount")?,
            rating: row.try_get("rating")?,
            material: row.try_get("material")?,
            dimensions: row.try_get("dimensions")?,
            sizes: row.try_get("sizes")?,
            colors: row.try_get("colors")?,
            images: row.try_get("images")?,
            min_order: row.try_get("min_order")?,
            is_active: row.try_get("is_active")?,
            stock: row.try_get("stock")?,
            reserved_stock: row.try_get("reserved_stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

fn column<T, S>(name: &str, value: S) -> Result<T, StoreError>
where
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| StoreError::storage(format!("column {name} out of range")))
}

impl TryFrom<VariantRow> for ProductVariant {
    type Error = StoreError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(ProductVariant {
            id: VariantId::new(column("id", row.id)?),
            product_id: ProductId::new(column("product_id", row.product_id)?),
            sku: row.sku,
            barcode: row.barcode,
            price: Money::new(row.price),
            discount: Money::new(row.discount),
            rating: column("rating", row.rating)?,
            material: row.material,
            dimensions: row.dimensions,
            sizes: row.sizes.0,
            colors: row.colors.0,
            images: row.images.0,
            min_order: column("min_order", row.min_order)?,
            is_active: row.is_active,
            stock: column("stock", row.stock)?,
            reserved_stock: column("reserved_stock", row.reserved_stock)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("55P03") => {
                warn!(operation, "row lock wait timed out");
                StoreError::storage(format!("lock timeout in {operation}"))
            }
            _ => StoreError::storage(format!("database error in {operation}: {}", db_err.message())),
        },
        sqlx::Error::PoolTimedOut => StoreError::storage(format!("connection pool timed out in {operation}")),
        sqlx::Error::PoolClosed => StoreError::storage(format!("connection pool closed in {operation}")),
        other => StoreError::storage(format!("sqlx error in {operation}: {other}")),
    }
}
