use std::sync::Arc;

use config::Config;
use sqlx::PgPool;

use cache::CacheAside;
use credentials::CredentialStore;
use delivery::DeliveryChannel;

pub mod cache;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod error;
pub mod middleware;
pub mod reaper;
pub mod result;
pub mod router;
pub mod routes;
pub mod utils;

/// 请求处理共享的状态，启动时创建一次，关闭时随进程释放
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: CacheAside,
    pub credentials: Arc<CredentialStore>,
    pub delivery: Arc<dyn DeliveryChannel>,
}
