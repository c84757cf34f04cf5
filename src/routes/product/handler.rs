use axum::extract::{Json, Query, State};

use super::model::{CategoryQuery, CreateProductRequest, IdQuery, Product};
use crate::{
    AppState,
    error::AppError,
    result::ApiResult,
    utils::success_to_api_response,
};

#[axum::debug_handler]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Vec<Product>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let products = Product::list(&state.pool, &state.cache, category).await?;
    Ok(success_to_api_response(products))
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Product> {
    match Product::find_by_id(&state.pool, &state.cache, &query.product_id).await? {
        Some(product) => Ok(success_to_api_response(product)),
        None => Err(AppError::NotFound("商品不存在".to_string())),
    }
}

#[axum::debug_handler]
pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<Product> {
    req.validate()
        .map_err(|msg| AppError::Validation(msg.to_string()))?;
    let product = Product::create(&state.pool, &state.cache, req).await?;
    Ok(success_to_api_response(product))
}
