use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::credentials::{RejectReason, StoreError};
use crate::delivery::DeliveryError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("credential rejected: {0:?}")]
    Credential(RejectReason),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl AppError {
    fn code_and_message(&self) -> (StatusCode, i32, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::OK, error_codes::VALIDATION_ERROR, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg.clone()),
            AppError::Credential(reason) => {
                let (code, msg) = match reason {
                    RejectReason::NotFound => (error_codes::TOKEN_INVALID, "链接或验证码无效"),
                    RejectReason::Expired => (error_codes::TOKEN_EXPIRED, "链接已过期，请重新申请"),
                    RejectReason::AlreadyUsed => (error_codes::TOKEN_USED, "链接已被使用"),
                    RejectReason::TooManyAttempts => {
                        (error_codes::TOO_MANY_ATTEMPTS, "验证码错误次数过多，请重新获取")
                    }
                };
                (StatusCode::OK, code, msg.to_string())
            }
            AppError::Database(_) | AppError::Store(_) | AppError::Delivery(_) | AppError::Hash(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "内部服务器错误".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = self.code_and_message();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}
