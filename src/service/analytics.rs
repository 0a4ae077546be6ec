use std::sync::Arc;

use super::session::SessionContext;
use crate::db::RecordStore;
use crate::models::{ActionType, AnalyticsSummary, NewAnalyticsEvent};

/// 最近操作条数
const RECENT_LIMIT: i64 = 10;

/// 操作日志 (只追加)
///
/// 写入失败只记日志，不影响调用方。
pub struct AnalyticsService {
    store: Option<Arc<dyn RecordStore>>,
    session: Arc<SessionContext>,
}

impl AnalyticsService {
    pub fn new(store: Option<Arc<dyn RecordStore>>, session: Arc<SessionContext>) -> Self {
        Self { store, session }
    }

    pub async fn log(&self, action: ActionType, section: &str, details: serde_json::Value) {
        let Some(store) = &self.store else {
            tracing::debug!("Analytics skipped ({}): backend not configured", action.as_str());
            return;
        };
        let Some(user_id) = self.session.user_id() else {
            tracing::debug!("Analytics skipped ({}): no session user", action.as_str());
            return;
        };

        let event = NewAnalyticsEvent {
            user_id,
            action_type: action,
            section: section.to_string(),
            details,
        };
        if let Err(e) = store.insert_analytics(&event).await {
            tracing::warn!("Failed to log analytics event {}: {}", action.as_str(), e);
        }
    }

    /// 当前用户的操作统计; 无用户或无后端时为空
    pub async fn summary(&self) -> Result<AnalyticsSummary, sqlx::Error> {
        let (Some(store), Some(user_id)) = (&self.store, self.session.user_id()) else {
            return Ok(AnalyticsSummary::default());
        };

        let mut summary = AnalyticsSummary::default();
        for (action_type, count) in store.count_analytics(&user_id).await? {
            match action_type.as_str() {
                "sync" => summary.total_syncs = count,
                "validation" => summary.total_validations = count,
                "generation" => summary.total_generations = count,
                _ => {}
            }
        }
        summary.recent_activity = store.recent_analytics(&user_id, RECENT_LIMIT).await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;
    use crate::models::SessionUser;
    use crate::staging::MemoryStore;
    use serde_json::json;

    fn signed_in() -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::restore(Arc::new(MemoryStore::new())));
        session
            .sign_in(SessionUser {
                id: "u-1".into(),
                email: None,
                name: None,
                access_token: Some("tok".into()),
            })
            .unwrap();
        session
    }

    #[tokio::test]
    async fn counts_by_action_and_keeps_recent() {
        let store = Arc::new(MemoryRecordStore::new());
        let analytics = AnalyticsService::new(Some(store.clone()), signed_in());

        for i in 0..12 {
            analytics.log(ActionType::Validation, "products", json!({ "n": i })).await;
        }
        analytics.log(ActionType::Sync, "clients", json!({ "count": 3 })).await;

        let summary = analytics.summary().await.unwrap();
        assert_eq!(summary.total_validations, 12);
        assert_eq!(summary.total_syncs, 1);
        assert_eq!(summary.total_generations, 0);
        assert_eq!(summary.recent_activity.len(), 10);
        assert_eq!(summary.recent_activity[0].action_type, "sync");
    }

    #[tokio::test]
    async fn anonymous_events_are_skipped() {
        let store = Arc::new(MemoryRecordStore::new());
        let session = Arc::new(SessionContext::restore(Arc::new(MemoryStore::new())));
        let analytics = AnalyticsService::new(Some(store.clone()), session);

        analytics.log(ActionType::Sync, "products", json!({})).await;
        assert!(store.analytics_events().is_empty());
        assert_eq!(analytics.summary().await.unwrap(), AnalyticsSummary::default());
    }
}
