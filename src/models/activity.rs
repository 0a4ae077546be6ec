use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Validation,
    Sync,
    Generation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Validation => "validation",
            ActionType::Sync => "sync",
            ActionType::Generation => "generation",
        }
    }
}

/// analytics 表行 (只追加)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub user_id: Option<String>,
    pub action_type: String,
    pub section: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnalyticsEvent {
    pub user_id: String,
    pub action_type: ActionType,
    pub section: String,
    pub details: serde_json::Value,
}

/// 用户操作统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_syncs: i64,
    pub total_validations: i64,
    pub total_generations: i64,
    pub recent_activity: Vec<AnalyticsEvent>,
}

/// qr_scans 表行 (只追加)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QrScan {
    pub id: i64,
    pub product_codificacion: Option<String>,
    pub scan_timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewQrScan {
    pub product_codificacion: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
}

/// 缓存的外部身份 (本地键 google_user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl SessionUser {
    pub fn has_token(&self) -> bool {
        self.access_token.as_deref().map_or(false, |t| !t.trim().is_empty())
    }
}
