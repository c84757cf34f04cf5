use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    cache::CacheStats,
    error::AppError,
    result::ApiResult,
    utils::success_to_api_response,
};

/// 按键或按模式失效，两者至少给一个
#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub key: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> ApiResult<CacheStats> {
    Ok(success_to_api_response(state.cache.stats()))
}

#[axum::debug_handler]
pub async fn invalidate(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> ApiResult<InvalidateResponse> {
    let removed = match (req.key.as_deref(), req.pattern.as_deref()) {
        (Some(key), _) if !key.is_empty() => usize::from(state.cache.invalidate_key(key)),
        (_, Some(pattern)) if !pattern.is_empty() => state.cache.invalidate(pattern),
        _ => return Err(AppError::Validation("需要提供 key 或 pattern".to_string())),
    };
    tracing::info!(removed, "Cache invalidated on request");
    Ok(success_to_api_response(InvalidateResponse { removed }))
}
