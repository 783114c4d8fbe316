use super::{SessionStore, StoreError, StoreResult};
use crate::session::{GameSession, SessionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, GameSession>,
    /// room_code -> session_id
    room_codes: HashMap<String, String>,
}

/// In-memory session store.
///
/// Durable backends plug in behind [`SessionStore`]; this is the backend the
/// server ships with and the one every test runs against.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: GameSession) -> StoreResult<GameSession> {
        let mut inner = self.inner.write().await;
        if inner.room_codes.contains_key(&session.room_code) {
            return Err(StoreError::RoomCodeTaken(session.room_code));
        }
        inner
            .room_codes
            .insert(session.room_code.clone(), session.session_id.clone());
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn by_session_id(&self, session_id: &str) -> StoreResult<GameSession> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    async fn by_room_code(&self, room_code: &str) -> StoreResult<GameSession> {
        let inner = self.inner.read().await;
        inner
            .room_codes
            .get(room_code)
            .and_then(|id| inner.sessions.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(room_code.to_string()))
    }

    async fn save(&self, mut session: GameSession) -> StoreResult<GameSession> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .sessions
            .get(&session.session_id)
            .ok_or_else(|| StoreError::NotFound(session.session_id.clone()))?;
        if stored.version != session.version {
            return Err(StoreError::Conflict(session.session_id.clone()));
        }
        session.version += 1;
        session.updated_at = chrono::Utc::now().to_rfc3339();
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn recent_open(&self, limit: usize) -> StoreResult<Vec<GameSession>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<GameSession> = inner
            .sessions
            .values()
            .filter(|s| matches!(s.status, SessionStatus::Lobby | SessionStatus::Active))
            .cloned()
            .collect();
        // RFC3339 timestamps in UTC sort lexicographically
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn session(code: &str) -> GameSession {
        GameSession::new("ai-adventure-dungeon", "host", code, 5, Map::new())
    }

    #[tokio::test]
    async fn test_insert_and_fetch_by_both_keys() {
        let store = MemoryStore::new();
        let created = store.insert(session("ROOM42")).await.unwrap();

        let by_id = store.by_session_id(&created.session_id).await.unwrap();
        let by_code = store.by_room_code("ROOM42").await.unwrap();
        assert_eq!(by_id.session_id, by_code.session_id);
        assert_eq!(by_id.room_code, "ROOM42");
    }

    #[tokio::test]
    async fn test_room_code_collision_rejected() {
        let store = MemoryStore::new();
        store.insert(session("SAME99")).await.unwrap();
        let err = store.insert(session("SAME99")).await.unwrap_err();
        assert!(matches!(err, StoreError::RoomCodeTaken(_)));
    }

    #[tokio::test]
    async fn test_save_rejects_stale_version() {
        let store = MemoryStore::new();
        let created = store.insert(session("CODE77")).await.unwrap();

        let fresh = store.by_session_id(&created.session_id).await.unwrap();
        let stale = fresh.clone();

        let saved = store.save(fresh).await.unwrap();
        assert_eq!(saved.version, 1);

        let err = store.save(stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_recent_open_excludes_ended() {
        let store = MemoryStore::new();
        let a = store.insert(session("AAAA11")).await.unwrap();
        store.insert(session("BBBB22")).await.unwrap();

        let mut ended = store.by_session_id(&a.session_id).await.unwrap();
        ended.status = SessionStatus::Ended;
        store.save(ended).await.unwrap();

        let open = store.recent_open(50).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].room_code, "BBBB22");
    }
}
