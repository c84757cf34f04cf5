use std::sync::Arc;

use axum::extract::{Json, Query, State};
use chrono::TimeDelta;
use tokio::task::JoinHandle;

use super::model::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetPasswordResponse,
    TokenQuery, User, VerificationCodeRequest, VerificationCodeResponse, VerifyEmailRequest,
    VerifyEmailResponse, normalize_email, validate_new_password,
};
use crate::{
    AppState,
    credentials::{CredentialStore, Purpose, RejectReason, Validation, describe_expiry},
    delivery::{Delivery, DeliveryChannel},
    error::AppError,
    result::ApiResult,
    utils::{hash_password, success_to_api_response},
};

/// 在后台签发并投递重置链接，失败只记日志
pub fn spawn_reset_link(
    credentials: Arc<CredentialStore>,
    delivery: Arc<dyn DeliveryChannel>,
    user_id: String,
    email: String,
    ttl: TimeDelta,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = match credentials
            .issue(&user_id, Purpose::PasswordReset, ttl)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Failed to issue password reset token: {}", e);
                return;
            }
        };
        let message = Delivery {
            to: email,
            purpose: Purpose::PasswordReset,
            secret: token.value,
            expires_in: describe_expiry(ttl),
        };
        if let Err(e) = delivery.deliver(&message).await {
            tracing::error!("Failed to deliver password reset token: {}", e);
        }
    })
}

/// 申请重置密码
///
/// 无论邮箱是否注册都返回成功，避免暴露账号是否存在。签发和投递放到后台，
/// 两种情况在请求路径上都只做一次用户查询，响应时间不泄露账号是否存在。
#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<ForgotPasswordResponse> {
    let email = normalize_email(&req.email)?;
    let ttl = state.config.reset_token_ttl();

    match User::find_by_email(&state.pool, &email).await? {
        Some(user) => {
            spawn_reset_link(
                state.credentials.clone(),
                state.delivery.clone(),
                user.user_id,
                email,
                ttl,
            );
        }
        None => tracing::debug!("Password reset requested for unknown email"),
    }

    Ok(success_to_api_response(ForgotPasswordResponse {
        expires_in: describe_expiry(ttl),
    }))
}

/// 只检查重置链接是否可用，不消费
#[axum::debug_handler]
pub async fn check_reset_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Validation> {
    let validation = state
        .credentials
        .validate(&query.token, Purpose::PasswordReset)
        .await?;
    match validation.reason {
        Some(reason) => Err(AppError::Credential(reason)),
        None => Ok(success_to_api_response(validation)),
    }
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<ResetPasswordResponse> {
    validate_new_password(&req.new_password)?;

    // 令牌无效时不做 bcrypt
    let validation = state
        .credentials
        .validate(&req.token, Purpose::PasswordReset)
        .await?;
    if let Some(reason) = validation.reason {
        return Err(AppError::Credential(reason));
    }

    // 哈希和数据库连接都在消费令牌之前准备好，这两步失败时链接仍然可用
    let password_hash = hash_password(&req.new_password)?;
    let mut tx = state.pool.begin().await?;

    let consumption = state
        .credentials
        .validate_and_consume(&req.token, Purpose::PasswordReset)
        .await?;
    let Some(user_id) = consumption.subject else {
        return Err(AppError::Credential(
            consumption.reason.unwrap_or(RejectReason::NotFound),
        ));
    };

    User::update_password(&mut *tx, &user_id, &password_hash).await?;
    tx.commit().await?;
    tracing::info!("Password reset for user: {}", user_id);

    Ok(success_to_api_response(ResetPasswordResponse {}))
}

#[axum::debug_handler]
pub async fn send_verification_code(
    State(state): State<AppState>,
    Json(req): Json<VerificationCodeRequest>,
) -> ApiResult<VerificationCodeResponse> {
    let email = normalize_email(&req.email)?;
    let ttl = state.config.verification_code_ttl();

    let code = state
        .credentials
        .issue_code(&email, Purpose::EmailVerify, ttl)
        .await?;
    state
        .delivery
        .deliver(&Delivery {
            to: email,
            purpose: Purpose::EmailVerify,
            secret: code.value,
            expires_in: describe_expiry(ttl),
        })
        .await?;

    Ok(success_to_api_response(VerificationCodeResponse {
        expires_in: describe_expiry(ttl),
    }))
}

#[axum::debug_handler]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<VerifyEmailResponse> {
    let email = normalize_email(&req.email)?;

    let consumption = state
        .credentials
        .verify_code(&email, Purpose::EmailVerify, req.code.trim())
        .await?;
    if !consumption.success {
        return Err(AppError::Credential(
            consumption.reason.unwrap_or(RejectReason::NotFound),
        ));
    }

    let user = match User::mark_email_verified(&state.pool, &email).await {
        Ok(user) => user,
        Err(sqlx::Error::RowNotFound) => return Err(AppError::NotFound("用户不存在".to_string())),
        Err(e) => return Err(e.into()),
    };

    Ok(success_to_api_response(VerifyEmailResponse {
        email: user.email,
        email_verified: user.email_verified,
    }))
}
