use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub expires_in: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {}

#[derive(Debug, Deserialize)]
pub struct VerificationCodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct VerificationCodeResponse {
    pub expires_in: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub email: String,
    pub email_verified: bool,
}

/// 去掉首尾空白并转小写，基本格式不对直接拒绝
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AppError::Validation("邮箱格式无效".to_string()))
    }
}

/// bcrypt 只使用前 72 个字节
pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.len() < 6 || password.len() > 72 {
        return Err(AppError::Validation("密码长度必须在6到72个字符之间".to_string()));
    }
    Ok(())
}

impl User {
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, email_verified
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_password<'e>(
        executor: impl PgExecutor<'e>,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1
            WHERE user_id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    pub async fn mark_email_verified(pool: &PgPool, email: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email_verified = true
            WHERE email = $1
            RETURNING user_id, email, email_verified
            "#,
        )
        .bind(email)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@localhost").is_err());
    }

    #[test]
    fn password_length_is_bounded() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
        assert!(validate_new_password(&"x".repeat(73)).is_err());
    }
}
