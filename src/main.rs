use cert_tracker_rust::db::{PgRecordStore, RecordStore};
use cert_tracker_rust::staging::{FileStore, StagingStore};
use cert_tracker_rust::{connect_backend, router, AppConfig, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置 (配置文件有误时退回环境变量)
    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config file, using environment only: {}", e);
        AppConfig::from_env()
    });
    info!(
        "Starting server on {}:{} (staging dir {})",
        config.server.host, config.server.port, config.staging.dir
    );

    // 后端可选: 未配置时列表为空、同步不可用
    let store: Option<Arc<dyn RecordStore>> = connect_backend(&config.database)
        .await
        .map(|pool| Arc::new(PgRecordStore::new(pool)) as Arc<dyn RecordStore>);

    let staging = StagingStore::new(Arc::new(FileStore::new(&config.staging.dir)));
    let state = AppState::new(store, staging, config.public.origin.clone());

    if let Err(e) = state.settings.reload().await {
        tracing::error!("Failed to load settings, using defaults: {}", e);
    }
    if state.session.current().is_none() {
        info!("No cached session");
    }

    let app = router(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/uploads/:domain        - upload products/clients file");
    info!("  POST /api/validate/:domain       - validate staged data");
    info!("  POST /api/sync/:domain           - upsert staged data");
    info!("  GET  /api/products, /api/clients - list views");
    info!("  GET  /api/qr/:code/image         - product QR (SVG)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
