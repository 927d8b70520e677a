use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, instrument};

use super::StoreError;
use crate::feed::{Color, Product};
use crate::normalization::identifier;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id BIGSERIAL PRIMARY KEY,
    stock_code TEXT NOT NULL,
    name TEXT NOT NULL,
    color TEXT[] NOT NULL DEFAULT '{}',
    price DOUBLE PRECISION,
    discounted_price DOUBLE PRECISION,
    is_discounted BOOLEAN NOT NULL DEFAULT FALSE,
    images TEXT[] NOT NULL DEFAULT '{}',
    quantity BIGINT NOT NULL,
    price_unit TEXT NOT NULL,
    product_type TEXT NOT NULL,
    series TEXT NOT NULL,
    sample_size TEXT,
    status TEXT,
    fabric TEXT,
    model_measurements TEXT,
    product_measurements TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS products_stock_code_key ON products (stock_code);
";

/// Process-scoped handle on the product store. Acquired once per run and
/// passed by reference into the sync engine, never held in a global.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StoreCounts {
    pub products: i64,
    pub discounted: i64,
    pub out_of_stock: i64,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let connect_options =
            PgConnectOptions::from_str(database_url).map_err(StoreError::Connect)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .map_err(StoreError::Connect)?;
        info!("connected to catalog store");
        Ok(Self { pool })
    }

    /// Bootstrap the products table and its natural-key index. Safe to run
    /// on every start.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Schema)?;
        Ok(())
    }

    /// Fetch one stored product by stock code (key is matched in its
    /// normalized upper-cased form).
    pub async fn find_by_stock_code(
        &self,
        stock_code: &str,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT stock_code, name, color, price, discounted_price, is_discounted, \
             images, quantity, price_unit, product_type, series, sample_size, status, \
             fabric, model_measurements, product_measurements, created_at, updated_at \
             FROM products WHERE stock_code = $1",
        )
        .bind(identifier(stock_code))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        row.map(|r| product_from_row(&r)).transpose()
    }

    pub async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        let discounted: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_discounted")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::Query)?;
        let out_of_stock: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE quantity = 0")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::Query)?;
        Ok(StoreCounts {
            products,
            discounted,
            out_of_stock,
        })
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    fn decode(e: sqlx::Error) -> StoreError {
        StoreError::Decode(e.to_string())
    }

    let color_raw: Vec<String> = row.try_get("color").map_err(decode)?;
    let color = color_raw
        .iter()
        .map(|token| token.parse::<Color>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(Product {
        stock_code: row.try_get("stock_code").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        color,
        price: row.try_get("price").map_err(decode)?,
        discounted_price: row.try_get("discounted_price").map_err(decode)?,
        is_discounted: row.try_get("is_discounted").map_err(decode)?,
        images: row.try_get("images").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        price_unit: row.try_get("price_unit").map_err(decode)?,
        product_type: row.try_get("product_type").map_err(decode)?,
        series: row.try_get("series").map_err(decode)?,
        sample_size: row.try_get("sample_size").map_err(decode)?,
        status: row.try_get("status").map_err(decode)?,
        fabric: row.try_get("fabric").map_err(decode)?,
        model_measurements: row.try_get("model_measurements").map_err(decode)?,
        product_measurements: row.try_get("product_measurements").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}
