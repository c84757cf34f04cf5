use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::cache::CacheAside;
use crate::cache::keys::{PRODUCT_KIND, product_category_key, product_id_key};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category: String,
    /// 价格，单位为分
    pub price_cents: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("商品名称不能为空");
        }
        if self.category.trim().is_empty() {
            return Err("商品分类不能为空");
        }
        if self.price_cents < 0 {
            return Err("价格不能为负数");
        }
        if self.stock < 0 {
            return Err("库存不能为负数");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub product_id: String,
}

impl Product {
    pub async fn list(
        pool: &PgPool,
        cache: &CacheAside,
        category: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        cache
            .get_or_load_default(&product_category_key(category), || async {
                sqlx::query_as::<_, Product>(
                    r#"
                    SELECT product_id, name, category, price_cents, stock, created_at
                    FROM products
                    WHERE $1::TEXT IS NULL OR category = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(category)
                .fetch_all(pool)
                .await
            })
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        cache: &CacheAside,
        product_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        cache
            .get_or_load_default(&product_id_key(product_id), || async {
                sqlx::query_as::<_, Product>(
                    r#"
                    SELECT product_id, name, category, price_cents, stock, created_at
                    FROM products
                    WHERE product_id = $1
                    "#,
                )
                .bind(product_id)
                .fetch_optional(pool)
                .await
            })
            .await
    }

    pub async fn create(
        pool: &PgPool,
        cache: &CacheAside,
        req: CreateProductRequest,
    ) -> Result<Self, sqlx::Error> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, name, category, price_cents, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING product_id, name, category, price_cents, stock, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(req.name.trim())
        .bind(req.category.trim())
        .bind(req.price_cents)
        .bind(req.stock)
        .fetch_one(pool)
        .await?;

        cache.invalidate_family(PRODUCT_KIND);
        tracing::info!("Created product: {}", product.product_id);
        Ok(product)
    }
}
