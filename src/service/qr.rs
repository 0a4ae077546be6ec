use qrcode::render::svg;
use qrcode::QrCode;
use serde_json::json;
use std::sync::Arc;

use super::analytics::AnalyticsService;
use crate::db::RecordStore;
use crate::error::{AppError, ConfigurationError};
use crate::models::{ActionType, NewQrScan, QrScan};

const SCAN_LIMIT: i64 = 100;
/// 二维码图片最小边长 (像素)
const QR_MIN_SIZE: u32 = 256;

/// 产品公开页链接，同时作为二维码内容
///
/// 编码含 `/`、`#`、空格等字符，链接按单一路径段解析。
pub fn product_url(origin: &str, codificacion: &str) -> String {
    format!(
        "{}/product/{}",
        origin.trim_end_matches('/'),
        urlencoding::encode(codificacion)
    )
}

/// 二维码链接与扫码记录
pub struct QrService {
    store: Option<Arc<dyn RecordStore>>,
    origin: Option<String>,
    analytics: Arc<AnalyticsService>,
}

impl QrService {
    pub fn new(store: Option<Arc<dyn RecordStore>>, origin: Option<String>, analytics: Arc<AnalyticsService>) -> Self {
        Self {
            store,
            origin,
            analytics,
        }
    }

    fn store(&self) -> Result<&Arc<dyn RecordStore>, ConfigurationError> {
        self.store.as_ref().ok_or(ConfigurationError::BackendNotConfigured)
    }

    /// 写入产品的 qr_code_path，返回链接
    pub async fn record_generated(&self, codificacion: &str) -> Result<String, AppError> {
        let origin = self.origin.as_deref().ok_or(ConfigurationError::OriginNotConfigured)?;
        let store = self.store()?;

        let url = product_url(origin, codificacion);
        if store.set_qr_code_path(codificacion, &url).await? == 0 {
            return Err(AppError::NotFound(format!("Producto no encontrado: {}", codificacion)));
        }
        tracing::info!("QR link recorded for {}: {}", codificacion, url);

        self.analytics
            .log(ActionType::Generation, "qr", json!({ "codificacion": codificacion, "url": url }))
            .await;
        Ok(url)
    }

    /// 产品链接的二维码 (SVG)
    pub fn render_svg(&self, codificacion: &str) -> Result<String, AppError> {
        let origin = self.origin.as_deref().ok_or(ConfigurationError::OriginNotConfigured)?;
        let url = product_url(origin, codificacion);
        let code = QrCode::new(url.as_bytes()).map_err(|e| AppError::BadRequest(format!("QR: {}", e)))?;
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build())
    }

    pub async fn log_scan(&self, scan: NewQrScan) -> Result<(), AppError> {
        self.store()?.insert_qr_scan(&scan).await?;
        tracing::debug!("QR scan logged for {}", scan.product_codificacion);
        Ok(())
    }

    /// 最近 100 条扫码记录，可按产品过滤; 未配置后端时为空
    pub async fn scans(&self, codificacion: Option<&str>) -> Result<Vec<QrScan>, sqlx::Error> {
        match &self.store {
            Some(store) => store.list_qr_scans(codificacion, SCAN_LIMIT).await,
            None => {
                tracing::warn!("Backend not configured, no QR scans to list");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;
    use crate::models::ProductRecord;
    use crate::service::session::SessionContext;
    use crate::staging::MemoryStore;

    fn service(store: Option<Arc<MemoryRecordStore>>, origin: Option<&str>) -> QrService {
        let backend = store.map(|s| s as Arc<dyn RecordStore>);
        let session = Arc::new(SessionContext::restore(Arc::new(MemoryStore::new())));
        let analytics = Arc::new(AnalyticsService::new(backend.clone(), session));
        QrService::new(backend, origin.map(str::to_string), analytics)
    }

    #[test]
    fn url_format() {
        assert_eq!(
            product_url("https://certs.example.com/", "ABC-1"),
            "https://certs.example.com/product/ABC-1"
        );
        assert_eq!(
            product_url("https://certs.example.com", "RES 12/2024 #3"),
            "https://certs.example.com/product/RES%2012%2F2024%20%233"
        );
    }

    #[test]
    fn svg_encodes_product_link() {
        // 后端不参与渲染
        let qr = service(None, Some("https://certs.example.com"));
        let image = qr.render_svg("ABC-1").unwrap();
        assert!(image.contains("<svg"));
        assert!(image.contains("</svg>"));

        let offline = service(None, None);
        assert!(matches!(
            offline.render_svg("ABC-1"),
            Err(AppError::Configuration(ConfigurationError::OriginNotConfigured))
        ));
    }

    #[tokio::test]
    async fn generated_link_is_stored_on_product() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed_product(ProductRecord::new("ABC-1"));
        let qr = service(Some(store.clone()), Some("https://certs.example.com"));

        let url = qr.record_generated("ABC-1").await.unwrap();
        let product = store.get_product("ABC-1").await.unwrap().unwrap();
        assert_eq!(product.qr_code_path.as_deref(), Some(url.as_str()));

        assert!(matches!(qr.record_generated("NOPE").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_origin_is_a_configuration_error() {
        let qr = service(Some(Arc::new(MemoryRecordStore::new())), None);
        assert!(matches!(
            qr.record_generated("ABC-1").await,
            Err(AppError::Configuration(ConfigurationError::OriginNotConfigured))
        ));
    }

    #[tokio::test]
    async fn scans_filter_by_product() {
        let qr = service(Some(Arc::new(MemoryRecordStore::new())), None);
        for code in ["A", "B", "A"] {
            qr.log_scan(NewQrScan {
                product_codificacion: code.to_string(),
                user_agent: Some("test".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        assert_eq!(qr.scans(Some("A")).await.unwrap().len(), 2);
        assert_eq!(qr.scans(None).await.unwrap().len(), 3);

        let offline = service(None, None);
        assert!(offline.scans(None).await.unwrap().is_empty());
    }
}
