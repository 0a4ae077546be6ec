use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use super::store::RecordStore;
use crate::models::{
    AnalyticsEvent, Client, ClientRecord, NewAnalyticsEvent, NewQrScan, Product, ProductRecord, QrScan,
    SettingRow,
};

/// 内存后端 (测试替身)
///
/// 行为与 Postgres 实现一致: 按自然键 upsert，整批原子，`reject` 中的键模拟约束冲突。
#[derive(Default)]
pub struct MemoryRecordStore {
    next_id: AtomicI64,
    clients: DashMap<i64, Client>,
    products: DashMap<String, Product>,
    settings: DashMap<String, (String, String)>,
    analytics: Mutex<Vec<AnalyticsEvent>>,
    qr_scans: Mutex<Vec<QrScan>>,
    reject: Mutex<HashSet<String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让包含该自然键的批次整体失败
    pub fn reject_key(&self, key: impl Into<String>) {
        self.lock_reject().insert(key.into());
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn analytics_events(&self) -> Vec<AnalyticsEvent> {
        self.analytics.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// 直接写入一行产品 (构造测试数据)
    pub fn seed_product(&self, record: ProductRecord) {
        let now = Utc::now();
        let product = Product {
            id: self.id(),
            record,
            certificates_path: None,
            djc_path: None,
            qr_code_path: None,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(product.record.codificacion.clone(), product);
    }

    fn id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock_reject(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.reject.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_batch(&self, keys: impl Iterator<Item = String>) -> Result<(), sqlx::Error> {
        let reject = self.lock_reject();
        for key in keys {
            if reject.contains(&key) {
                return Err(sqlx::Error::Protocol(format!("constraint violation for key {}", key)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert_clients(&self, records: &[ClientRecord]) -> Result<u64, sqlx::Error> {
        self.check_batch(records.iter().map(|r| r.cuit.to_string()))?;
        let now = Utc::now();
        for record in records {
            match self.clients.get_mut(&record.cuit) {
                Some(mut existing) => {
                    existing.record = record.clone();
                    existing.updated_at = now;
                }
                None => {
                    let client = Client {
                        id: self.id(),
                        record: record.clone(),
                        documents_path: None,
                        created_at: now,
                        updated_at: now,
                    };
                    self.clients.insert(record.cuit, client);
                }
            }
        }
        Ok(records.len() as u64)
    }

    async fn upsert_products(&self, records: &[ProductRecord]) -> Result<u64, sqlx::Error> {
        self.check_batch(records.iter().map(|r| r.codificacion.clone()))?;
        let now = Utc::now();
        for record in records {
            match self.products.get_mut(&record.codificacion) {
                Some(mut existing) => {
                    existing.record = record.clone();
                    existing.updated_at = now;
                }
                None => {
                    let product = Product {
                        id: self.id(),
                        record: record.clone(),
                        certificates_path: None,
                        djc_path: None,
                        qr_code_path: None,
                        created_at: now,
                        updated_at: now,
                    };
                    self.products.insert(record.codificacion.clone(), product);
                }
            }
        }
        Ok(records.len() as u64)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, sqlx::Error> {
        let mut clients: Vec<Client> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(clients)
    }

    async fn get_client(&self, cuit: i64) -> Result<Option<Client>, sqlx::Error> {
        Ok(self.clients.get(&cuit).map(|e| e.value().clone()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        let mut products: Vec<Product> = self.products.iter().map(|e| e.value().clone()).collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn get_product(&self, codificacion: &str) -> Result<Option<Product>, sqlx::Error> {
        Ok(self.products.get(codificacion).map(|e| e.value().clone()))
    }

    async fn list_products_by_cuit(&self, cuit: i64) -> Result<Vec<Product>, sqlx::Error> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|e| e.value().record.cuit == Some(cuit))
            .map(|e| e.value().clone())
            .collect();
        products.sort_by(|a, b| a.record.codificacion.cmp(&b.record.codificacion));
        Ok(products)
    }

    async fn set_qr_code_path(&self, codificacion: &str, path: &str) -> Result<u64, sqlx::Error> {
        match self.products.get_mut(codificacion) {
            Some(mut product) => {
                product.qr_code_path = Some(path.to_string());
                product.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn load_settings(&self) -> Result<Vec<SettingRow>, sqlx::Error> {
        Ok(self
            .settings
            .iter()
            .map(|e| SettingRow {
                key: e.key().clone(),
                value: Some(e.value().0.clone()),
            })
            .collect())
    }

    async fn upsert_setting(&self, key: &str, value: &str, description: &str) -> Result<(), sqlx::Error> {
        self.settings
            .insert(key.to_string(), (value.to_string(), description.to_string()));
        Ok(())
    }

    async fn insert_analytics(&self, event: &NewAnalyticsEvent) -> Result<(), sqlx::Error> {
        let row = AnalyticsEvent {
            id: self.id(),
            user_id: Some(event.user_id.clone()),
            action_type: event.action_type.as_str().to_string(),
            section: event.section.clone(),
            details: event.details.clone(),
            created_at: Utc::now(),
        };
        self.analytics
            .lock()
            .map_err(|_| sqlx::Error::PoolClosed)?
            .push(row);
        Ok(())
    }

    async fn count_analytics(&self, user_id: &str) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let events = self.analytics.lock().map_err(|_| sqlx::Error::PoolClosed)?;
        let mut counts: Vec<(String, i64)> = Vec::new();
        for event in events.iter().filter(|e| e.user_id.as_deref() == Some(user_id)) {
            match counts.iter_mut().find(|entry| entry.0 == event.action_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((event.action_type.clone(), 1)),
            }
        }
        Ok(counts)
    }

    async fn recent_analytics(&self, user_id: &str, limit: i64) -> Result<Vec<AnalyticsEvent>, sqlx::Error> {
        let events = self.analytics.lock().map_err(|_| sqlx::Error::PoolClosed)?;
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_qr_scan(&self, scan: &NewQrScan) -> Result<(), sqlx::Error> {
        let row = QrScan {
            id: self.id(),
            product_codificacion: Some(scan.product_codificacion.clone()),
            scan_timestamp: Utc::now(),
            user_agent: scan.user_agent.clone(),
            ip_address: scan.ip_address.clone(),
            referrer: scan.referrer.clone(),
        };
        self.qr_scans
            .lock()
            .map_err(|_| sqlx::Error::PoolClosed)?
            .push(row);
        Ok(())
    }

    async fn list_qr_scans(&self, codificacion: Option<&str>, limit: i64) -> Result<Vec<QrScan>, sqlx::Error> {
        let scans = self.qr_scans.lock().map_err(|_| sqlx::Error::PoolClosed)?;
        Ok(scans
            .iter()
            .rev()
            .filter(|s| codificacion.map_or(true, |c| s.product_codificacion.as_deref() == Some(c)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
