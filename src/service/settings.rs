use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::db::RecordStore;
use crate::error::{AppError, ConfigurationError};
use crate::models::settings::SETTING_KEYS;
use crate::models::Settings;

/// 运行时设置 (默认值 + settings 表覆盖)
pub struct SettingsService {
    store: Option<Arc<dyn RecordStore>>,
    current: RwLock<Settings>,
}

impl SettingsService {
    pub fn new(store: Option<Arc<dyn RecordStore>>) -> Self {
        Self {
            store,
            current: RwLock::new(Settings::default()),
        }
    }

    pub fn current(&self) -> Settings {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn threshold(&self) -> i64 {
        self.current.read().unwrap_or_else(|e| e.into_inner()).critical_days_threshold
    }

    /// 从后端重新加载; 未配置后端时恢复默认值
    pub async fn reload(&self) -> Result<Settings, sqlx::Error> {
        let settings = match &self.store {
            Some(store) => Settings::from_rows(&store.load_settings().await?),
            None => {
                tracing::warn!("Backend not configured, using default settings");
                Settings::default()
            }
        };
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings.clone();
        tracing::info!(
            "Settings loaded (threshold {} days)",
            settings.critical_days_threshold
        );
        Ok(settings)
    }

    /// 保存部分设置，只接受已知键; 返回保存后的设置
    pub async fn save(&self, changes: &HashMap<String, String>) -> Result<Settings, AppError> {
        let store = self.store.as_ref().ok_or(ConfigurationError::BackendNotConfigured)?;

        if let Some(unknown) = changes.keys().find(|k| !SETTING_KEYS.contains(&k.as_str())) {
            return Err(AppError::BadRequest(format!("Configuración desconocida: {}", unknown)));
        }

        for key in SETTING_KEYS.iter().filter(|k| changes.contains_key(**k)) {
            let value = &changes[*key];
            store.upsert_setting(key, value.trim(), Settings::description(key)).await?;
        }
        tracing::info!("Saved {} settings", changes.len());

        Ok(self.reload().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;

    #[tokio::test]
    async fn defaults_without_backend() {
        let service = SettingsService::new(None);
        let settings = service.reload().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(service.threshold(), 30);

        let changes = HashMap::from([("CRITICAL_DAYS_THRESHOLD".to_string(), "45".to_string())]);
        assert!(matches!(
            service.save(&changes).await,
            Err(AppError::Configuration(ConfigurationError::BackendNotConfigured))
        ));
    }

    #[tokio::test]
    async fn save_then_reload_applies_threshold() {
        let store = Arc::new(MemoryRecordStore::new());
        let service = SettingsService::new(Some(store.clone()));

        let changes = HashMap::from([
            ("CRITICAL_DAYS_THRESHOLD".to_string(), " 45 ".to_string()),
            ("SUPABASE_BUCKET_QRS".to_string(), "qrs".to_string()),
        ]);
        let saved = service.save(&changes).await.unwrap();
        assert_eq!(saved.critical_days_threshold, 45);
        assert_eq!(saved.supabase_bucket_qrs, "qrs");

        let fresh = SettingsService::new(Some(store));
        fresh.reload().await.unwrap();
        assert_eq!(fresh.threshold(), 45);
    }

    #[tokio::test]
    async fn unknown_keys_are_rejected() {
        let service = SettingsService::new(Some(Arc::new(MemoryRecordStore::new())));
        let changes = HashMap::from([("LANGUAGE".to_string(), "es".to_string())]);
        assert!(matches!(service.save(&changes).await, Err(AppError::BadRequest(_))));
    }
}
