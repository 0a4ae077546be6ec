use async_trait::async_trait;

use crate::models::{
    AnalyticsEvent, Client, ClientRecord, NewAnalyticsEvent, NewQrScan, Product, ProductRecord, QrScan,
    SettingRow,
};

/// 后端数据表访问
///
/// 生产实现为 `PgRecordStore`，测试注入 `MemoryRecordStore`。
/// 批量 upsert 为整批原子操作: 任一记录被拒绝则整批不生效。
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_clients(&self, records: &[ClientRecord]) -> Result<u64, sqlx::Error>;
    async fn upsert_products(&self, records: &[ProductRecord]) -> Result<u64, sqlx::Error>;

    async fn list_clients(&self) -> Result<Vec<Client>, sqlx::Error>;
    async fn get_client(&self, cuit: i64) -> Result<Option<Client>, sqlx::Error>;
    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error>;
    async fn get_product(&self, codificacion: &str) -> Result<Option<Product>, sqlx::Error>;
    async fn list_products_by_cuit(&self, cuit: i64) -> Result<Vec<Product>, sqlx::Error>;

    /// 写入二维码链接，返回受影响行数
    async fn set_qr_code_path(&self, codificacion: &str, path: &str) -> Result<u64, sqlx::Error>;

    async fn load_settings(&self) -> Result<Vec<SettingRow>, sqlx::Error>;
    async fn upsert_setting(&self, key: &str, value: &str, description: &str) -> Result<(), sqlx::Error>;

    async fn insert_analytics(&self, event: &NewAnalyticsEvent) -> Result<(), sqlx::Error>;
    /// (action_type, count)
    async fn count_analytics(&self, user_id: &str) -> Result<Vec<(String, i64)>, sqlx::Error>;
    async fn recent_analytics(&self, user_id: &str, limit: i64) -> Result<Vec<AnalyticsEvent>, sqlx::Error>;

    async fn insert_qr_scan(&self, scan: &NewQrScan) -> Result<(), sqlx::Error>;
    async fn list_qr_scans(&self, codificacion: Option<&str>, limit: i64) -> Result<Vec<QrScan>, sqlx::Error>;
}
