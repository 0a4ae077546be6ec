use std::sync::{Arc, RwLock};

use crate::error::StagingError;
use crate::models::SessionUser;
use crate::staging::KeyValueStore;

/// 本地缓存的外部身份键
pub const SESSION_KEY: &str = "google_user";

/// 当前会话
///
/// 启动时从本地缓存恢复 (仅当存在 access token)，登出时清除。
pub struct SessionContext {
    kv: Arc<dyn KeyValueStore>,
    user: RwLock<Option<SessionUser>>,
}

impl SessionContext {
    pub fn restore(kv: Arc<dyn KeyValueStore>) -> Self {
        let user = match kv.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionUser>(&raw) {
                Ok(user) if user.has_token() => {
                    tracing::info!("Session restored for {}", user.id);
                    Some(user)
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Cached session is unreadable, ignoring: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read cached session: {}", e);
                None
            }
        };

        Self {
            kv,
            user: RwLock::new(user),
        }
    }

    pub fn current(&self) -> Option<SessionUser> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|u| u.id)
    }

    pub fn sign_in(&self, user: SessionUser) -> Result<(), StagingError> {
        let json = serde_json::to_string(&user)?;
        self.kv.put(SESSION_KEY, &json)?;
        tracing::info!("Signed in as {}", user.id);
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), StagingError> {
        self.kv.remove(SESSION_KEY)?;
        let previous = self.user.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(user) = previous {
            tracing::info!("Signed out {}", user.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::MemoryStore;

    fn user(token: Option<&str>) -> SessionUser {
        SessionUser {
            id: "u-1".into(),
            email: Some("op@example.com".into()),
            name: Some("Operador".into()),
            access_token: token.map(str::to_string),
        }
    }

    #[test]
    fn restores_only_with_token() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.put(SESSION_KEY, &serde_json::to_string(&user(None)).unwrap()).unwrap();
        assert!(SessionContext::restore(kv.clone()).current().is_none());

        kv.put(SESSION_KEY, &serde_json::to_string(&user(Some("tok"))).unwrap()).unwrap();
        assert_eq!(SessionContext::restore(kv).user_id().as_deref(), Some("u-1"));
    }

    #[test]
    fn garbage_cache_is_ignored() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.put(SESSION_KEY, "{not json").unwrap();
        assert!(SessionContext::restore(kv).current().is_none());
    }

    #[test]
    fn sign_in_persists_and_sign_out_clears() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::restore(kv.clone());
        session.sign_in(user(Some("tok"))).unwrap();

        let again = SessionContext::restore(kv.clone());
        assert_eq!(again.current(), Some(user(Some("tok"))));

        session.sign_out().unwrap();
        assert!(session.current().is_none());
        assert!(kv.get(SESSION_KEY).unwrap().is_none());
    }
}
