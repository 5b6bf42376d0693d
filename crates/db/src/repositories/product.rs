use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use pidloga_core::domain::product::{PriceTier, Product, ProductId};
use pidloga_core::gateway::{CatalogGateway, GatewayError};

use super::{decode_error, encode_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts the product, or refreshes the existing row with the same SKU.
    pub async fn upsert(&self, product: &Product) -> Result<ProductId, RepositoryError> {
        let now = encode_timestamp(Utc::now());
        let matrix = serde_json::to_string(&product.price_matrix).map_err(decode_error)?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO product (sku, name, name_search, price, unit, pack_size, price_matrix,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sku) DO UPDATE SET
                 name = excluded.name,
                 name_search = excluded.name_search,
                 price = excluded.price,
                 unit = excluded.unit,
                 pack_size = excluded.pack_size,
                 price_matrix = excluded.price_matrix,
                 updated_at = excluded.updated_at
             RETURNING id",
        )
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.name.to_lowercase())
        .bind(product.price.to_string())
        .bind(&product.unit)
        .bind(product.pack_size.to_string())
        .bind(matrix)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductId(id))
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn search(&self, text: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(&text.trim().to_lowercase()));
        let rows = sqlx::query(
            "SELECT id, sku, name, price, unit, pack_size, price_matrix
             FROM product
             WHERE name_search LIKE ? ESCAPE '\\'
             ORDER BY name ASC, id ASC
             LIMIT ?",
        )
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, sku, name, price, unit, pack_size, price_matrix
             FROM product WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let sku: Option<String> = row.try_get("sku").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let price: String = row.try_get("price").map_err(decode_error)?;
    let unit: String = row.try_get("unit").map_err(decode_error)?;
    let pack_size: String = row.try_get("pack_size").map_err(decode_error)?;
    let matrix: String = row.try_get("price_matrix").map_err(decode_error)?;

    let mut price_matrix: Vec<PriceTier> = serde_json::from_str(&matrix)
        .map_err(|error| RepositoryError::Decode(format!("price_matrix: {error}")))?;
    price_matrix.sort_by_key(|tier| tier.width);

    Ok(Product {
        id: ProductId(id),
        name,
        sku,
        price: parse_decimal("price", &price)?,
        unit,
        pack_size: parse_decimal("pack_size", &pack_size)?,
        price_matrix,
    })
}

#[async_trait::async_trait]
impl CatalogGateway for SqlCatalogRepository {
    async fn find_products_by_name_substring(
        &self,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Product>, GatewayError> {
        Ok(self.search(text, limit).await?)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, GatewayError> {
        Ok(self.find_by_id(id).await?)
    }
}
