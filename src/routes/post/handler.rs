use axum::extract::{Json, Query, State};

use super::model::{
    ArchiveMonth, ArchiveQuery, CreatePostRequest, IdQuery, PageQuery, Post, UpdatePostRequest,
};
use crate::{
    AppState,
    error::AppError,
    result::ApiResult,
    utils::success_to_api_response,
};

#[axum::debug_handler]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<Post>> {
    let (page, page_size) = query.normalized();
    let posts = Post::list(&state.pool, &state.cache, page, page_size).await?;
    Ok(success_to_api_response(posts))
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Post> {
    match Post::find_by_id(&state.pool, &state.cache, &query.post_id).await? {
        Some(post) => Ok(success_to_api_response(post)),
        None => Err(AppError::NotFound("文章不存在".to_string())),
    }
}

#[axum::debug_handler]
pub async fn archive(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> ApiResult<Vec<Post>> {
    let Some((start, end)) = query.range() else {
        return Err(AppError::Validation("年份或月份无效".to_string()));
    };
    let posts =
        Post::list_by_month(&state.pool, &state.cache, query.year, query.month, start, end).await?;
    Ok(success_to_api_response(posts))
}

#[axum::debug_handler]
pub async fn archive_index(State(state): State<AppState>) -> ApiResult<Vec<ArchiveMonth>> {
    let months = Post::archive_index(&state.pool, &state.cache).await?;
    Ok(success_to_api_response(months))
}

#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<Post> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("标题不能为空".to_string()));
    }
    let post = Post::create(&state.pool, &state.cache, req).await?;
    Ok(success_to_api_response(post))
}

#[axum::debug_handler]
pub async fn update_post(
    State(state): State<AppState>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Post> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("标题不能为空".to_string()));
    }
    match Post::update(&state.pool, &state.cache, req).await? {
        Some(post) => Ok(success_to_api_response(post)),
        None => Err(AppError::NotFound("文章不存在".to_string())),
    }
}
