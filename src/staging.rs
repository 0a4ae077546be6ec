use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StagingError;
use crate::models::{Domain, RawDataset};

/// 本地持久化键值存储 (值为 JSON 文本)
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StagingError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StagingError>;
    fn remove(&self, key: &str) -> Result<(), StagingError>;
}

/// 目录下每个键一个文件: `{dir}/{key}.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StagingError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StagingError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path(key);
        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StagingError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存实现 (测试注入)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StagingError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StagingError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StagingError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// 上传暂存区: 每个数据域保留最近一次解析的数据集
///
/// 无过期，后写覆盖先写。
#[derive(Clone)]
pub struct StagingStore {
    kv: Arc<dyn KeyValueStore>,
}

impl StagingStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// 底层键值存储 (会话缓存共用)
    pub fn kv(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    pub fn put(&self, domain: Domain, dataset: &RawDataset) -> Result<(), StagingError> {
        let json = serde_json::to_string(dataset)?;
        self.kv.put(&domain.staging_key(), &json)?;
        tracing::info!(
            "Staged {} for {}: {} rows",
            dataset.file_name,
            domain,
            dataset.total_rows
        );
        Ok(())
    }

    /// 无法解码的旧数据视为不存在
    pub fn get(&self, domain: Domain) -> Result<Option<RawDataset>, StagingError> {
        let Some(raw) = self.kv.get(&domain.staging_key())? else {
            return Ok(None);
        };
        match serde_json::from_str::<RawDataset>(&raw) {
            Ok(dataset) => Ok(Some(dataset)),
            Err(e) => {
                tracing::warn!("Staged data for {} is unreadable, ignoring: {}", domain, e);
                Ok(None)
            }
        }
    }

    pub fn clear(&self, domain: Domain) -> Result<(), StagingError> {
        self.kv.remove(&domain.staging_key())?;
        tracing::info!("Cleared staged data for {}", domain);
        Ok(())
    }
}
