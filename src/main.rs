use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use storefront_backend::{
    AppState,
    cache::{CacheAside, TtlCache},
    clock::SystemClock,
    config::Config,
    credentials::{CredentialStore, PgCredentialBackend},
    delivery::{DeliveryChannel, HttpRelayDelivery, LogDelivery},
    reaper::spawn_reaper,
    router::create_router,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'storefront_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let backend = PgCredentialBackend::new(pool.clone());
    backend
        .migrate()
        .await
        .expect("Failed to prepare credential table");

    // 缓存和凭证共用同一个时钟
    let clock = SystemClock::shared();
    let cache = CacheAside::new(TtlCache::new(clock.clone()), config.cache_ttl());
    let credentials = Arc::new(
        CredentialStore::new(Arc::new(backend), clock)
            .with_max_code_attempts(config.verification_max_attempts),
    );

    let delivery: Arc<dyn DeliveryChannel> = match &config.mail_relay_url {
        Some(url) => {
            tracing::info!("Delivering credentials through mail relay {}", url);
            Arc::new(HttpRelayDelivery::new(url.clone()).expect("Failed to build mail relay client"))
        }
        None => {
            tracing::warn!("MAIL_RELAY_URL not set, credentials will only be logged");
            Arc::new(LogDelivery)
        }
    };

    let reaper = spawn_reaper(credentials.clone(), config.reaper_interval());

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        cache,
        credentials,
        delivery,
    };

    let router = create_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    reaper.abort();
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
