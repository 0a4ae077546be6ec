use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub staging: StagingConfig,
    pub public: PublicConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 后端数据库；未配置时相关功能降级为空结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// 本地暂存目录 (`{domain}_file_data` 等键)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub dir: String,
}

/// 对外访问地址，用于二维码链接 `{origin}/product/{codificacion}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicConfig {
    pub origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig { url: None },
            staging: StagingConfig {
                dir: "./data/staging".to_string(),
            },
            public: PublicConfig { origin: None },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> config/default.toml (可选) -> APP_* 环境变量 -> 传统环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let loaded: AppConfig = config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("staging.dir", defaults.staging.dir)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(loaded.with_env_overrides())
    }

    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Ok(dir) = std::env::var("STAGING_DIR") {
            self.staging.dir = dir;
        }
        if let Ok(origin) = std::env::var("PUBLIC_ORIGIN") {
            self.public.origin = Some(origin);
        }
        self.database.url = self.database.url.filter(|u| !u.trim().is_empty());
        self.public.origin = self.public.origin.filter(|o| o.starts_with("http"));
        self
    }
}
