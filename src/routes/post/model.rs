use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::cache::CacheAside;
use crate::cache::keys::{
    ARCHIVE_KIND, POST_KIND, archive_index_key, archive_month_key, post_id_key, post_list_key,
};

/// 分页大小上限
pub const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub post_id: String,
    pub title: String,
    pub body: String,
    pub author_id: String,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 归档目录中的一个月
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArchiveMonth {
    pub year: i32,
    pub month: i32,
    pub post_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub post_id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// 页码从 1 开始，页大小限制在 1..=MAX_PAGE_SIZE
    pub fn normalized(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub post_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    pub year: i32,
    pub month: u32,
}

impl ArchiveQuery {
    /// 该月的起止时间，月份不合法时返回 `None`
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = Utc
            .with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()?;
        let (next_year, next_month) = if start.month() == 12 {
            (start.year() + 1, 1)
        } else {
            (start.year(), start.month() + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()?;
        Some((start, end))
    }
}

impl Post {
    pub async fn list(
        pool: &PgPool,
        cache: &CacheAside,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let offset = i64::from(page - 1) * i64::from(page_size);
        cache
            .get_or_load_default(&post_list_key(page, page_size), || async {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT post_id, title, body, author_id, published_at, updated_at
                    FROM posts
                    ORDER BY published_at DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(i64::from(page_size))
                .bind(offset)
                .fetch_all(pool)
                .await
            })
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        cache: &CacheAside,
        post_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        cache
            .get_or_load_default(&post_id_key(post_id), || async {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT post_id, title, body, author_id, published_at, updated_at
                    FROM posts
                    WHERE post_id = $1
                    "#,
                )
                .bind(post_id)
                .fetch_optional(pool)
                .await
            })
            .await
    }

    pub async fn list_by_month(
        pool: &PgPool,
        cache: &CacheAside,
        year: i32,
        month: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        cache
            .get_or_load_default(&archive_month_key(year, month), || async {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT post_id, title, body, author_id, published_at, updated_at
                    FROM posts
                    WHERE published_at >= $1 AND published_at < $2
                    ORDER BY published_at DESC
                    "#,
                )
                .bind(start)
                .bind(end)
                .fetch_all(pool)
                .await
            })
            .await
    }

    pub async fn archive_index(
        pool: &PgPool,
        cache: &CacheAside,
    ) -> Result<Vec<ArchiveMonth>, sqlx::Error> {
        cache
            .get_or_load_default(&archive_index_key(), || async {
                sqlx::query_as::<_, ArchiveMonth>(
                    r#"
                    SELECT
                        EXTRACT(YEAR FROM published_at)::INT AS year,
                        EXTRACT(MONTH FROM published_at)::INT AS month,
                        COUNT(*) AS post_count
                    FROM posts
                    GROUP BY 1, 2
                    ORDER BY 1 DESC, 2 DESC
                    "#,
                )
                .fetch_all(pool)
                .await
            })
            .await
    }

    pub async fn create(
        pool: &PgPool,
        cache: &CacheAside,
        req: CreatePostRequest,
    ) -> Result<Self, sqlx::Error> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (post_id, title, body, author_id, published_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING post_id, title, body, author_id, published_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&req.title)
        .bind(&req.body)
        .bind(&req.author_id)
        .fetch_one(pool)
        .await?;

        Self::invalidate(cache);
        tracing::info!("Created post: {}", post.post_id);
        Ok(post)
    }

    pub async fn update(
        pool: &PgPool,
        cache: &CacheAside,
        req: UpdatePostRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $1, body = $2, updated_at = NOW()
            WHERE post_id = $3
            RETURNING post_id, title, body, author_id, published_at, updated_at
            "#,
        )
        .bind(&req.title)
        .bind(&req.body)
        .bind(&req.post_id)
        .fetch_optional(pool)
        .await?;

        if post.is_some() {
            Self::invalidate(cache);
        }
        Ok(post)
    }

    /// 文章变化会影响列表、详情和归档
    fn invalidate(cache: &CacheAside) {
        cache.invalidate_family(POST_KIND);
        cache.invalidate_family(ARCHIVE_KIND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_is_clamped() {
        let q = PageQuery {
            page: Some(0),
            page_size: Some(1000),
        };
        assert_eq!(q.normalized(), (1, MAX_PAGE_SIZE));

        let q = PageQuery {
            page: None,
            page_size: None,
        };
        assert_eq!(q.normalized(), (1, 20));
    }

    #[test]
    fn archive_range_covers_exactly_one_month() {
        let q = ArchiveQuery {
            year: 2024,
            month: 12,
        };
        let (start, end) = q.range().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let bad = ArchiveQuery {
            year: 2024,
            month: 13,
        };
        assert!(bad.range().is_none());
    }
}
