use std::sync::Arc;

use chrono::TimeDelta;

use super::backend::{CredentialBackend, StoreError};
use super::issuer::{TokenIssuer, code_digest, is_valid_code_format, is_valid_format};
use super::models::{
    Consumption, Credential, IssuedToken, Purpose, RejectReason, Validation, redact,
};
use crate::clock::SharedClock;

/// 默认验证码可尝试次数
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;

/// 生成值撞上已有凭证时的重试次数
const ISSUE_RETRIES: usize = 3;

/// 凭证存储：签发、只读校验、一次性消费和过期清理
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    issuer: TokenIssuer,
    clock: SharedClock,
    max_code_attempts: u32,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn CredentialBackend>, clock: SharedClock) -> Self {
        Self {
            backend,
            issuer: TokenIssuer::new(clock.clone()),
            clock,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    pub fn with_max_code_attempts(mut self, max_code_attempts: u32) -> Self {
        self.max_code_attempts = max_code_attempts;
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn max_code_attempts(&self) -> u32 {
        self.max_code_attempts
    }

    /// 为 `subject` 签发令牌，同用途下旧的未使用令牌随之作废
    pub async fn issue(
        &self,
        subject: &str,
        purpose: Purpose,
        ttl: TimeDelta,
    ) -> Result<IssuedToken, StoreError> {
        for _ in 0..ISSUE_RETRIES {
            let issued = self.issuer.issue(ttl);
            let credential = Credential::new(
                issued.value.clone(),
                subject,
                purpose,
                self.clock.now(),
                issued.expires_at,
            );
            match self.backend.replace_unused(&credential).await {
                Ok(revoked) => {
                    tracing::info!(
                        purpose = purpose.as_str(),
                        token = %credential.redacted_value(),
                        revoked,
                        expires_at = %issued.expires_at,
                        "Issued credential"
                    );
                    return Ok(issued);
                }
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict)
    }

    /// 签发数字验证码，返回明文验证码；库里只存摘要
    pub async fn issue_code(
        &self,
        subject: &str,
        purpose: Purpose,
        ttl: TimeDelta,
    ) -> Result<IssuedToken, StoreError> {
        for _ in 0..ISSUE_RETRIES {
            let issued = self.issuer.issue_code(ttl);
            let credential = Credential::new(
                code_digest(purpose, subject, &issued.value),
                subject,
                purpose,
                self.clock.now(),
                issued.expires_at,
            );
            match self.backend.replace_unused(&credential).await {
                Ok(revoked) => {
                    tracing::info!(
                        purpose = purpose.as_str(),
                        revoked,
                        expires_at = %issued.expires_at,
                        "Issued verification code"
                    );
                    return Ok(issued);
                }
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict)
    }

    /// 只读校验，不改变任何状态
    pub async fn validate(&self, value: &str, purpose: Purpose) -> Result<Validation, StoreError> {
        if !is_valid_format(value) {
            return Ok(Validation::rejected(RejectReason::NotFound));
        }

        let credential = self.backend.find_by_value(value).await?;
        Ok(match self.classify(credential.as_ref(), purpose) {
            Some(reason) => Validation::rejected(reason),
            None => Validation::valid(),
        })
    }

    /// 校验并消费令牌，并发调用同一令牌时只有一个成功
    pub async fn validate_and_consume(
        &self,
        value: &str,
        purpose: Purpose,
    ) -> Result<Consumption, StoreError> {
        if !is_valid_format(value) {
            return Ok(Consumption::rejected(RejectReason::NotFound));
        }

        let Some(credential) = self.backend.find_by_value(value).await? else {
            return Ok(Consumption::rejected(RejectReason::NotFound));
        };
        if let Some(reason) = self.classify(Some(&credential), purpose) {
            tracing::warn!(token = %redact(value), ?reason, "Rejected credential");
            return Ok(Consumption::rejected(reason));
        }

        self.consume(credential, purpose).await
    }

    /// 按主体校验数字验证码，错误次数达到上限后该验证码作废
    pub async fn verify_code(
        &self,
        subject: &str,
        purpose: Purpose,
        code: &str,
    ) -> Result<Consumption, StoreError> {
        if !is_valid_code_format(code) {
            return Ok(Consumption::rejected(RejectReason::NotFound));
        }

        let now = self.clock.now();
        let Some(credential) = self
            .backend
            .find_latest_active(subject, purpose, now)
            .await?
        else {
            return Ok(Consumption::rejected(RejectReason::NotFound));
        };

        let Some(attempt) = self
            .backend
            .reserve_attempt(&credential.value, self.max_code_attempts)
            .await?
        else {
            tracing::warn!(purpose = purpose.as_str(), "Verification code attempts exhausted");
            return Ok(Consumption::rejected(RejectReason::TooManyAttempts));
        };

        if code_digest(purpose, subject, code) != credential.value {
            tracing::warn!(
                purpose = purpose.as_str(),
                attempt,
                max = self.max_code_attempts,
                "Wrong verification code"
            );
            return Ok(Consumption::rejected(RejectReason::NotFound));
        }

        self.consume(credential, purpose).await
    }

    /// 删除已过期凭证，返回删除数量
    pub async fn cleanup_expired(&self) -> Result<u64, StoreError> {
        let removed = self
            .backend
            .delete_where_expired_before(self.clock.now())
            .await?;
        if removed > 0 {
            tracing::info!(removed, "Removed expired credentials");
        }
        Ok(removed)
    }

    async fn consume(
        &self,
        credential: Credential,
        purpose: Purpose,
    ) -> Result<Consumption, StoreError> {
        let now = self.clock.now();
        if self
            .backend
            .conditional_mark_used(&credential.value, now)
            .await?
        {
            tracing::info!(
                purpose = purpose.as_str(),
                token = %credential.redacted_value(),
                "Consumed credential"
            );
            return Ok(Consumption::consumed(credential.subject));
        }

        // 条件更新失败：被别人抢先消费、刚好过期或已被清理
        let current = self.backend.find_by_value(&credential.value).await?;
        let reason = self
            .classify(current.as_ref(), purpose)
            .unwrap_or(RejectReason::AlreadyUsed);
        tracing::warn!(token = %credential.redacted_value(), ?reason, "Lost consumption race");
        Ok(Consumption::rejected(reason))
    }

    /// 不可用时返回原因；已使用优先于已过期
    fn classify(&self, credential: Option<&Credential>, purpose: Purpose) -> Option<RejectReason> {
        match credential {
            None => Some(RejectReason::NotFound),
            Some(c) if c.purpose != purpose => Some(RejectReason::NotFound),
            Some(c) if c.is_used() => Some(RejectReason::AlreadyUsed),
            Some(c) if c.is_expired_at(self.clock.now()) => Some(RejectReason::Expired),
            Some(_) => None,
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("max_code_attempts", &self.max_code_attempts)
            .finish_non_exhaustive()
    }
}
