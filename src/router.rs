use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, middleware::log_errors, routes};

// 重置密码和邮箱验证
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/auth/reset-password/check", get(routes::auth::check_reset_token))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route("/auth/verification-code", post(routes::auth::send_verification_code))
        .route("/auth/verify-email", post(routes::auth::verify_email))
}

// 文章和归档
pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/posts",
            get(routes::post::list_posts)
                .post(routes::post::create_post)
                .put(routes::post::update_post),
        )
        .route("/posts/by-id", get(routes::post::find_by_id))
        .route("/archive", get(routes::post::archive))
        .route("/archive/index", get(routes::post::archive_index))
}

// 商品
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(routes::product::list_products).post(routes::product::create_product),
        )
        .route("/products/by-id", get(routes::product::find_by_id))
}

// 缓存管理，没有鉴权，只应在内网或鉴权层之后打开
pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(routes::cache::stats))
        .route("/cache/invalidate", post(routes::cache::invalidate))
}

/// 创建主路由，挂在 `api_base_uri` 下
pub fn create_router(state: AppState) -> Router {
    let mut api = Router::new()
        .merge(auth_routes())
        .merge(post_routes())
        .merge(product_routes());
    if state.config.cache_admin_enabled {
        tracing::warn!("Cache admin routes enabled without authentication");
        api = api.merge(cache_routes());
    }

    let base = state.config.api_base_uri.trim_end_matches('/').to_string();
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&base, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
