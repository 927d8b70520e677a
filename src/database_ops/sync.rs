use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use sqlx::{QueryBuilder, Row};
use tracing::{info, instrument, warn};

use super::db::Db;
use super::StoreError;
use crate::feed::Product;

/// Rows per bulk statement; 18 binds per row keeps each statement well under
/// the Postgres bind-parameter cap.
const UPSERT_CHUNK: usize = 1000;

/// One failed slice of a bulk write. The rest of the batch still runs.
#[derive(Debug, Clone, Serialize)]
pub struct BulkWriteFailure {
    pub first_stock_code: String,
    pub records: usize,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct UpsertOutcome {
    pub inserted: u64,
    pub modified: u64,
    pub failures: Vec<BulkWriteFailure>,
}

/// Bulk-write seam to the product store: insert-if-absent / update-if-present
/// matched on `stock_code`. The sync engine only needs this one primitive;
/// tests provide an in-memory implementation.
#[async_trait]
pub trait CatalogStore {
    async fn bulk_upsert(&self, products: &[Product]) -> Result<UpsertOutcome, StoreError>;
}

#[async_trait]
impl CatalogStore for Db {
    #[instrument(skip(self, products), fields(batch = products.len()))]
    async fn bulk_upsert(&self, products: &[Product]) -> Result<UpsertOutcome, StoreError> {
        let mut outcome = UpsertOutcome::default();
        for chunk in products.chunks(UPSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO products (stock_code, name, color, price, discounted_price, \
                 is_discounted, images, quantity, price_unit, product_type, series, \
                 sample_size, status, fabric, model_measurements, product_measurements, \
                 created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, p| {
                let colors: Vec<String> =
                    p.color.iter().map(|c| c.as_str().to_string()).collect();
                b.push_bind(&p.stock_code)
                    .push_bind(&p.name)
                    .push_bind(colors)
                    .push_bind(p.price)
                    .push_bind(p.discounted_price)
                    .push_bind(p.is_discounted)
                    .push_bind(&p.images)
                    .push_bind(p.quantity)
                    .push_bind(&p.price_unit)
                    .push_bind(&p.product_type)
                    .push_bind(&p.series)
                    .push_bind(p.sample_size.as_deref())
                    .push_bind(p.status.as_deref())
                    .push_bind(p.fabric.as_deref())
                    .push_bind(p.model_measurements.as_deref())
                    .push_bind(p.product_measurements.as_deref())
                    .push_bind(p.created_at)
                    .push_bind(p.updated_at);
            });
            // created_at is absent from the update arm: the first insert wins,
            // later syncs only move updated_at.
            qb.push(
                " ON CONFLICT (stock_code) DO UPDATE SET \
                 name = EXCLUDED.name, color = EXCLUDED.color, price = EXCLUDED.price, \
                 discounted_price = EXCLUDED.discounted_price, \
                 is_discounted = EXCLUDED.is_discounted, images = EXCLUDED.images, \
                 quantity = EXCLUDED.quantity, price_unit = EXCLUDED.price_unit, \
                 product_type = EXCLUDED.product_type, series = EXCLUDED.series, \
                 sample_size = EXCLUDED.sample_size, status = EXCLUDED.status, \
                 fabric = EXCLUDED.fabric, \
                 model_measurements = EXCLUDED.model_measurements, \
                 product_measurements = EXCLUDED.product_measurements, \
                 updated_at = EXCLUDED.updated_at \
                 RETURNING (xmax = 0) AS inserted",
            );
            match qb.build().persistent(false).fetch_all(&self.pool).await {
                Ok(rows) => {
                    for row in rows {
                        let fresh: bool =
                            row.try_get("inserted").map_err(StoreError::BulkWrite)?;
                        if fresh {
                            outcome.inserted += 1;
                        } else {
                            outcome.modified += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, records = chunk.len(), "bulk upsert chunk failed");
                    outcome.failures.push(BulkWriteFailure {
                        first_stock_code: chunk[0].stock_code.clone(),
                        records: chunk.len(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }
}

/// What one reconciliation run did, including any failed slices.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub submitted: usize,
    pub inserted: u64,
    pub modified: u64,
    pub failures: Vec<BulkWriteFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reconcile one batch against the store with a single bulk upsert keyed by
/// stock code. Duplicate stock codes collapse last-write-wins before the
/// statement is built (the store forbids touching one row twice in a single
/// bulk write). A store failure degrades to a reported failure with zero
/// counts; it never unwinds the run.
///
/// Single writer per run: concurrent batches would have to be partitioned by
/// disjoint stock-code sets to avoid lost updates on one key.
pub async fn sync_batch<S>(store: &S, products: &[Product]) -> SyncReport
where
    S: CatalogStore + ?Sized,
{
    if products.is_empty() {
        return SyncReport::default();
    }

    let mut unique: IndexMap<&str, &Product> = IndexMap::with_capacity(products.len());
    for product in products {
        unique.insert(product.stock_code.as_str(), product);
    }
    let deduped: Vec<Product> = unique.into_values().cloned().collect();
    if deduped.len() < products.len() {
        info!(
            dropped = products.len() - deduped.len(),
            "collapsed duplicate stock codes (last write wins)"
        );
    }
    let submitted = deduped.len();

    match store.bulk_upsert(&deduped).await {
        Ok(outcome) => SyncReport {
            submitted,
            inserted: outcome.inserted,
            modified: outcome.modified,
            failures: outcome.failures,
        },
        Err(e) => {
            warn!(error = %e, "bulk upsert failed; no counts available");
            SyncReport {
                submitted,
                inserted: 0,
                modified: 0,
                failures: vec![BulkWriteFailure {
                    first_stock_code: deduped[0].stock_code.clone(),
                    records: submitted,
                    error: e.to_string(),
                }],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<String, Product>>,
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl CatalogStore for MemoryStore {
        async fn bulk_upsert(
            &self,
            products: &[Product],
        ) -> Result<UpsertOutcome, StoreError> {
            if self.fail {
                return Err(StoreError::BulkWrite(sqlx::Error::PoolClosed));
            }
            self.batches.lock().unwrap().push(products.len());
            let mut rows = self.rows.lock().unwrap();
            let mut outcome = UpsertOutcome::default();
            for product in products {
                match rows.entry(product.stock_code.clone()) {
                    Entry::Occupied(mut existing) => {
                        let mut next = product.clone();
                        next.created_at = existing.get().created_at;
                        existing.insert(next);
                        outcome.modified += 1;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(product.clone());
                        outcome.inserted += 1;
                    }
                }
            }
            Ok(outcome)
        }
    }

    fn product(stock_code: &str, price: f64) -> Product {
        let now = Utc::now();
        Product {
            stock_code: stock_code.to_string(),
            name: "Top".into(),
            color: vec![],
            price: Some(price),
            discounted_price: None,
            is_discounted: false,
            images: vec![],
            quantity: 1,
            price_unit: "Usd".into(),
            product_type: "Top".into(),
            series: "1s".into(),
            sample_size: None,
            status: None,
            fabric: None,
            model_measurements: None,
            product_measurements: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn first_run_inserts_rerun_never_reinserts() {
        let store = MemoryStore::default();
        let batch = vec![product("A1", 10.0), product("B2", 20.0), product("C3", 30.0)];

        let first = sync_batch(&store, &batch).await;
        assert_eq!((first.inserted, first.modified), (3, 0));

        let second = sync_batch(&store, &batch).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.modified, 3);
        assert_eq!(store.rows.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn changed_price_reconciles_on_the_key() {
        let store = MemoryStore::default();
        sync_batch(&store, &[product("ABC123", 10.0)]).await;

        let report = sync_batch(&store, &[product("ABC123", 12.5)]).await;
        assert_eq!((report.inserted, report.modified), (0, 1));
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows["ABC123"].price, Some(12.5));
    }

    #[tokio::test]
    async fn duplicate_stock_codes_collapse_last_write_wins() {
        let store = MemoryStore::default();
        let batch = vec![product("A1", 10.0), product("A1", 99.0)];

        let report = sync_batch(&store, &batch).await;
        assert_eq!(report.submitted, 1);
        assert_eq!((report.inserted, report.modified), (1, 0));
        assert_eq!(store.batches.lock().unwrap().as_slice(), &[1]);
        assert_eq!(store.rows.lock().unwrap()["A1"].price, Some(99.0));
    }

    #[tokio::test]
    async fn store_failure_degrades_to_a_reported_failure() {
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let report = sync_batch(&store, &[product("A1", 10.0)]).await;
        assert_eq!((report.inserted, report.modified), (0, 0));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].first_stock_code, "A1");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryStore::default();
        let report = sync_batch(&store, &[]).await;
        assert_eq!((report.submitted, report.inserted, report.modified), (0, 0, 0));
        assert!(store.batches.lock().unwrap().is_empty());
    }
}
