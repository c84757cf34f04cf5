use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Credential, Purpose};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("credential value already exists")]
    Conflict,
    #[error("unrecognised credential purpose: {0}")]
    UnknownPurpose(String),
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// 凭证持久化接口
///
/// 任何能提供下面这些原子操作的行存储都可以作为后端。
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// 写入新凭证，`value` 重复时返回 [`StoreError::Conflict`]
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn find_by_value(&self, value: &str) -> Result<Option<Credential>, StoreError>;

    /// 仅当凭证未使用且 `now` 早于过期时间时设置 `used_at = now`
    ///
    /// 检查和写入是一个原子操作，并发调用最多只有一个返回 `true`。
    async fn conditional_mark_used(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// 删除 `expires_at < now` 的凭证，返回删除数量
    async fn delete_where_expired_before(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// 某个主体最新的一条可用凭证
    async fn find_latest_active(
        &self,
        subject: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> Result<Option<Credential>, StoreError>;

    /// 原子地占用一次尝试机会，已达上限时返回 `None`
    async fn reserve_attempt(
        &self,
        value: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>, StoreError>;

    /// 删除某个主体该用途下所有未使用的凭证
    async fn revoke_unused(&self, subject: &str, purpose: Purpose) -> Result<u64, StoreError>;

    /// 作废同一主体同一用途下未使用的凭证并写入新凭证，返回作废数量
    ///
    /// 并发签发时最后只剩一条可用凭证。默认实现分两步执行，不是原子的，
    /// 自带后端都覆盖了它。`value` 冲突时什么都不改，返回 [`StoreError::Conflict`]。
    async fn replace_unused(&self, credential: &Credential) -> Result<u64, StoreError> {
        if self.find_by_value(&credential.value).await?.is_some() {
            return Err(StoreError::Conflict);
        }
        let revoked = self
            .revoke_unused(&credential.subject, credential.purpose)
            .await?;
        self.insert(credential).await?;
        Ok(revoked)
    }
}
