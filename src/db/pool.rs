use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// 创建数据库连接池
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    // 慢查询日志阈值 5秒
    let connect_options = PgConnectOptions::from_str(database_url)?
        .application_name("cert-tracker")
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(5));

    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

/// 按配置连接后端; 未配置或连接失败时返回 None，后端功能降级
pub async fn connect_backend(config: &DatabaseConfig) -> Option<PgPool> {
    let Some(url) = config.url.as_deref() else {
        tracing::warn!("DATABASE_URL not set - backend features disabled");
        return None;
    };

    match create_pool(url).await {
        Ok(pool) => {
            tracing::info!("Database pool created");
            Some(pool)
        }
        Err(e) => {
            tracing::error!("Database connection failed, backend features disabled: {}", e);
            None
        }
    }
}
