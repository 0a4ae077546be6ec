pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::db::RecordStore;
use crate::service::{AnalyticsService, QrService, SessionContext, SettingsService, SyncService};
use crate::staging::StagingStore;

/// 上传文件大小上限
const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// 共享状态: 后端 (可选)、暂存区与各上下文服务
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn RecordStore>>,
    pub staging: StagingStore,
    pub session: Arc<SessionContext>,
    pub settings: Arc<SettingsService>,
    pub analytics: Arc<AnalyticsService>,
    pub sync: Arc<SyncService>,
    pub qr: Arc<QrService>,
}

impl AppState {
    /// 会话从暂存区共用的键值存储恢复
    pub fn new(store: Option<Arc<dyn RecordStore>>, staging: StagingStore, public_origin: Option<String>) -> Self {
        let session = Arc::new(SessionContext::restore(staging.kv()));
        let settings = Arc::new(SettingsService::new(store.clone()));
        let analytics = Arc::new(AnalyticsService::new(store.clone(), session.clone()));
        let sync = Arc::new(SyncService::new(store.clone(), staging.clone(), analytics.clone()));
        let qr = Arc::new(QrService::new(store.clone(), public_origin, analytics.clone()));
        Self {
            store,
            staging,
            session,
            settings,
            analytics,
            sync,
            qr,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/uploads/:domain",
            post(handlers::upload).get(handlers::staged).delete(handlers::clear_upload),
        )
        .route("/api/validate/:domain", post(handlers::validate))
        .route("/api/validate/:domain/report", get(handlers::validation_report))
        .route("/api/sync/:domain", post(handlers::sync))
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/:code", get(handlers::get_product))
        .route("/api/clients", get(handlers::list_clients))
        .route("/api/clients/:cuit", get(handlers::get_client))
        .route("/api/settings", get(handlers::get_settings).put(handlers::save_settings))
        .route("/api/settings/reload", post(handlers::reload_settings))
        .route("/api/analytics", get(handlers::analytics_summary))
        .route("/api/session", post(handlers::sign_in).delete(handlers::sign_out))
        .route("/api/qr/scans", get(handlers::qr_scans))
        .route("/api/qr/:code", post(handlers::record_qr))
        .route("/api/qr/:code/scan", post(handlers::log_qr_scan))
        .route("/api/qr/:code/image", get(handlers::qr_image))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}
