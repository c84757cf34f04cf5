use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 统一响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

/// 处理函数的返回类型，错误由 [`AppError`] 转成同样的响应结构
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
