use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::backend::{CredentialBackend, StoreError};
use super::models::{Credential, Purpose};

/// PostgreSQL 凭证后端
///
/// 多副本部署时以数据库为准，消费靠 `UPDATE ... WHERE used_at IS NULL` 保证只成功一次。
#[derive(Debug, Clone)]
pub struct PgCredentialBackend {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    value: String,
    subject: String,
    purpose: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    attempts: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = StoreError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let purpose =
            Purpose::parse(&row.purpose).ok_or_else(|| StoreError::UnknownPurpose(row.purpose))?;
        Ok(Credential {
            value: row.value,
            subject: row.subject,
            purpose,
            expires_at: row.expires_at,
            used_at: row.used_at,
            attempts: row.attempts.max(0) as u32,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT value, subject, purpose, expires_at, used_at, attempts, created_at FROM credentials";

impl PgCredentialBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建表和索引，可重复执行
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                value       TEXT PRIMARY KEY,
                subject     TEXT NOT NULL,
                purpose     TEXT NOT NULL,
                expires_at  TIMESTAMPTZ NOT NULL,
                used_at     TIMESTAMPTZ,
                attempts    INTEGER NOT NULL DEFAULT 0,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS credentials_subject_purpose_idx ON credentials (subject, purpose)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS credentials_expires_at_idx ON credentials (expires_at)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Credential table ready");
        Ok(())
    }
}

#[async_trait]
impl CredentialBackend for PgCredentialBackend {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO credentials (value, subject, purpose, expires_at, used_at, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&credential.value)
        .bind(&credential.subject)
        .bind(credential.purpose.as_str())
        .bind(credential.expires_at)
        .bind(credential.used_at)
        .bind(credential.attempts as i32)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict),
            Err(e) => {
                tracing::error!("Failed to insert credential: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<Credential>, StoreError> {
        let row: Option<CredentialRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE value = $1"))
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Credential::try_from).transpose()
    }

    async fn conditional_mark_used(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET used_at = $2
            WHERE value = $1 AND used_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_where_expired_before(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM credentials WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_latest_active(
        &self,
        subject: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> Result<Option<Credential>, StoreError> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE subject = $1 AND purpose = $2 AND used_at IS NULL AND expires_at > $3 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(subject)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Credential::try_from).transpose()
    }

    async fn reserve_attempt(
        &self,
        value: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>, StoreError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE credentials
            SET attempts = attempts + 1
            WHERE value = $1 AND attempts < $2
            RETURNING attempts
            "#,
        )
        .bind(value)
        .bind(max_attempts.min(i32::MAX as u32) as i32)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(attempts,)| attempts.max(0) as u32))
    }

    async fn revoke_unused(&self, subject: &str, purpose: Purpose) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM credentials WHERE subject = $1 AND purpose = $2 AND used_at IS NULL",
        )
        .bind(subject)
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn replace_unused(&self, credential: &Credential) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 同一主体同一用途的签发串行执行，事务结束自动释放
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || '|' || $2))")
            .bind(&credential.subject)
            .bind(credential.purpose.as_str())
            .execute(&mut *tx)
            .await?;

        let revoked = sqlx::query(
            "DELETE FROM credentials WHERE subject = $1 AND purpose = $2 AND used_at IS NULL",
        )
        .bind(&credential.subject)
        .bind(credential.purpose.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let inserted = sqlx::query(
            r#"
            INSERT INTO credentials (value, subject, purpose, expires_at, used_at, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&credential.value)
        .bind(&credential.subject)
        .bind(credential.purpose.as_str())
        .bind(credential.expires_at)
        .bind(credential.used_at)
        .bind(credential.attempts as i32)
        .bind(credential.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(revoked)
            }
            // 回滚，旧凭证保持原样
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict),
            Err(e) => {
                tracing::error!("Failed to replace credential: {:?}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn rows_with_unknown_purpose_are_rejected() {
        let now = Utc::now();
        let row = CredentialRow {
            value: "v".into(),
            subject: "s".into(),
            purpose: "login".into(),
            expires_at: now + TimeDelta::hours(1),
            used_at: None,
            attempts: 0,
            created_at: now,
        };
        assert!(matches!(
            Credential::try_from(row),
            Err(StoreError::UnknownPurpose(p)) if p == "login"
        ));
    }

    #[test]
    fn rows_map_onto_credentials() {
        let now = Utc::now();
        let row = CredentialRow {
            value: "v".into(),
            subject: "s".into(),
            purpose: "email-verify".into(),
            expires_at: now + TimeDelta::hours(1),
            used_at: Some(now),
            attempts: 2,
            created_at: now,
        };
        let credential = Credential::try_from(row).unwrap();
        assert_eq!(credential.purpose, Purpose::EmailVerify);
        assert_eq!(credential.attempts, 2);
        assert!(credential.is_used());
    }
}
